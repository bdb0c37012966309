use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
};

/// Two same-padded 3x3 convolutions, each followed by an optional batch norm
/// and a ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    norm1: Option<BatchNorm<B, 2>>,
    conv2: Conv2d<B>,
    norm2: Option<BatchNorm<B, 2>>,
    activation: Relu,
    dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = match &self.norm1 {
            Some(norm) => norm.forward(x),
            None => x,
        };
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);

        let x = self.conv2.forward(x);
        let x = match &self.norm2 {
            Some(norm) => norm.forward(x),
            None => x,
        };

        self.activation.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "0.2")]
    dropout: f64,
    #[config(default = true)]
    batch_norm: bool,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let norm = || {
            self.batch_norm
                .then(|| BatchNormConfig::new(self.num_filters).init(device))
        };

        ConvBlock {
            conv1: Conv2dConfig::new([self.input_channels, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm1: norm(),
            conv2: Conv2dConfig::new([self.num_filters, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm2: norm(),
            activation: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    conv_block: ConvBlock<B>,
    max_pool: MaxPool2d,
}

impl<B: Backend> EncoderBlock<B> {
    /// Returns the pooled features and the pre-pool skip connection.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip = self.conv_block.forward(x);
        let x = self.max_pool.forward(skip.clone());

        (x, skip)
    }
}

#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    conv_block: ConvBlockConfig,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            conv_block: self.conv_block.init(device),
            max_pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    upsample: ConvTranspose2d<B>,
    conv_block: ConvBlock<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.upsample.forward(x);
        let x = Tensor::cat(vec![x, skip], 1);

        self.conv_block.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    input_channels: usize,
    num_filters: usize,
    conv_block: ConvBlockConfig,
}

impl DecoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            upsample: ConvTranspose2dConfig::new([self.input_channels, self.num_filters], [2, 2])
                .with_stride([2, 2])
                .init(device),
            conv_block: self.conv_block.init(device),
        }
    }
}
