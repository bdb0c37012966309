mod blocks;
mod unet;

use burn::prelude::*;

pub use blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};

pub use unet::{UNet, UNetConfig};

/// A model mapping images `[batch, 3, H, W]` to class probabilities
/// `[batch, classes, H, W]`.
pub trait SegmentationModel<B: Backend> {
    fn num_classes(&self) -> usize;

    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}
