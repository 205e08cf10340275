//! Frames and the sources that produce them.

use async_channel::{Receiver, Sender, TryRecvError};
use bevy::prelude::*;
use bevy::render::render_resource::TextureFormat;
use bevy::render::view::screenshot::ScreenshotCaptured;

/// Bytes per pixel of a captured frame (BGRA, 8 bits per channel).
pub const BYTES_PER_PIXEL: usize = 4;

/// One captured image: tightly packed BGRA rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl Frame {
    /// Wrap BGRA bytes. Fails if the length is not `width * height * 4`.
    pub fn from_bgra(width: u32, height: u32, bytes: Vec<u8>) -> Option<Self> {
        (bytes.len() == frame_len(width, height)).then_some(Self {
            width,
            height,
            bytes,
        })
    }

    /// Convert RGBA bytes, swapping red and blue.
    pub fn from_rgba(width: u32, height: u32, mut bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() != frame_len(width, height) {
            return None;
        }
        for px in bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        Some(Self {
            width,
            height,
            bytes,
        })
    }

    /// Convert a captured Bevy image. Only 8-bit RGBA/BGRA formats are
    /// supported.
    pub fn from_image(image: &Image) -> Option<Self> {
        let data = image.data.clone()?;
        let (width, height) = (image.width(), image.height());
        match image.texture_descriptor.format {
            TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => {
                Self::from_bgra(width, height, data)
            }
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => {
                Self::from_rgba(width, height, data)
            }
            _ => None,
        }
    }

    /// RGBA copy of the pixels, for image export.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = self.bytes.clone();
        for px in rgba.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        rgba
    }
}

/// Size in bytes of a `width × height` frame.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Outcome of asking a source for a frame.
#[derive(Debug)]
pub enum CaptureStatus {
    Ready(Frame),
    /// No frame was ready this tick.
    Unavailable,
}

/// Vertical order of the rows a source produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowOrder {
    #[default]
    TopDown,
    /// First row is the bottom of the image (OpenGL readback).
    BottomUp,
}

/// Host capability returning rendered frames in presentation order.
pub trait FrameSource {
    fn capture(&mut self) -> CaptureStatus;

    fn row_order(&self) -> RowOrder {
        RowOrder::TopDown
    }
}

/// Frame source fed by Bevy screenshot observers.
///
/// Each requested screenshot lands in the channel once the GPU readback
/// completes, usually a frame or two after the request.
#[derive(Resource, Clone)]
pub struct ScreenshotFrameSource {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
}

impl Default for ScreenshotFrameSource {
    fn default() -> Self {
        let (sender, receiver) = async_channel::unbounded();
        Self { sender, receiver }
    }
}

impl ScreenshotFrameSource {
    /// Observer forwarding a captured screenshot into this source.
    pub fn forwarder(&self) -> impl FnMut(On<ScreenshotCaptured>) {
        let source = self.clone();
        move |captured| match Frame::from_image(&captured.image) {
            Some(frame) => source.deliver(frame),
            None => warn!(
                "Unsupported screenshot format {:?}, dropping frame",
                captured.image.texture_descriptor.format
            ),
        }
    }

    /// Queue a frame for a later `capture`.
    pub fn deliver(&self, frame: Frame) {
        if self.sender.try_send(frame).is_err() {
            warn!("Recording frame channel closed, dropping frame");
        }
    }

    /// Frames delivered but not yet consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl FrameSource for ScreenshotFrameSource {
    fn capture(&mut self) -> CaptureStatus {
        match self.receiver.try_recv() {
            Ok(frame) => CaptureStatus::Ready(frame),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => CaptureStatus::Unavailable,
        }
    }
}
