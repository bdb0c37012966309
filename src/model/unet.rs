use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::{sigmoid, softmax},
};

use super::SegmentationModel;
use super::blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};

/// U-Net producing per-pixel class probabilities `[batch, classes, H, W]`.
///
/// Input height and width must be divisible by `2^depth`.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoders: Vec<EncoderBlock<B>>,
    bottleneck: ConvBlock<B>,
    decoders: Vec<DecoderBlock<B>>,
    head: Conv2d<B>,
    use_softmax: bool,

    num_classes: usize,
}

#[derive(Config, Debug)]
pub struct UNetConfig {
    #[config(default = 3)]
    pub input_channels: usize,
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = 64)]
    pub base_channels: usize,
    #[config(default = 4)]
    pub depth: usize,
    #[config(default = "0.2")]
    pub dropout: f64,
    #[config(default = true)]
    pub batch_norm: bool,
    #[config(default = true)]
    pub use_softmax: bool,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let conv_block = |input_channels, num_filters| {
            ConvBlockConfig::new(input_channels, num_filters)
                .with_dropout(self.dropout)
                .with_batch_norm(self.batch_norm)
        };

        let mut encoders = Vec::with_capacity(self.depth);
        let mut channels = self.input_channels;
        let mut filters = self.base_channels;
        for _ in 0..self.depth {
            encoders.push(EncoderBlockConfig::new(conv_block(channels, filters)).init(device));
            channels = filters;
            filters *= 2;
        }

        let bottleneck = conv_block(channels, filters).init(device);

        let decoders = (0..self.depth)
            .rev()
            .map(|level| {
                let num_filters = self.base_channels << level;
                let input_channels = num_filters * 2;

                DecoderBlockConfig::new(
                    input_channels,
                    num_filters,
                    conv_block(input_channels, num_filters),
                )
                .init(device)
            })
            .collect();

        UNet {
            encoders,
            bottleneck,
            decoders,
            head: Conv2dConfig::new([self.base_channels, self.num_classes], [1, 1]).init(device),
            use_softmax: self.use_softmax,
            num_classes: self.num_classes,
        }
    }

    /// Spatial sizes must be a multiple of this factor, `2^depth`.
    ///
    /// `None` when the depth does not fit in a `usize` shift.
    pub fn size_factor(&self) -> Option<usize> {
        u32::try_from(self.depth)
            .ok()
            .and_then(|depth| 1usize.checked_shl(depth))
    }
}

impl<B: Backend> UNet<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.encoders.len());
        let mut x = images;

        for encoder in &self.encoders {
            let (pooled, skip) = encoder.forward(x);
            skips.push(skip);
            x = pooled;
        }

        let mut x = self.bottleneck.forward(x);

        for (decoder, skip) in self.decoders.iter().zip(skips.into_iter().rev()) {
            x = decoder.forward(x, skip);
        }

        let logits = self.head.forward(x);

        if self.use_softmax {
            softmax(logits, 1)
        } else {
            sigmoid(logits)
        }
    }
}

impl<B: Backend> SegmentationModel<B> for UNet<B> {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }
}
