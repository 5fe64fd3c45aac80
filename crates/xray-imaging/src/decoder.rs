//! 影像解码
//!
//! 将文件或字节数据解码为 [`RasterImage`]。

use std::path::Path;
use tracing::{debug, error};
use xray_core::{Result, XrayError};

use crate::raster::RasterImage;

/// 影像解码器接口
pub trait ImageDecoder: Send + Sync {
    /// 解码影像文件
    fn decode_file(&self, path: &Path) -> Result<RasterImage>;

    /// 解码内存中的影像数据
    fn decode_bytes(&self, data: &[u8]) -> Result<RasterImage>;

    /// 仅读取影像尺寸 (宽, 高)
    fn dimensions(&self, path: &Path) -> Result<(usize, usize)>;
}

/// 基于 `image` 库的解码器，支持 PNG/JPEG/BMP/TIFF
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl StandardDecoder {
    pub fn new() -> Self {
        Self
    }

    fn into_raster(img: image::DynamicImage) -> Result<RasterImage> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        RasterImage::from_rgb(width as usize, height as usize, rgb.as_raw())
    }
}

impl ImageDecoder for StandardDecoder {
    fn decode_file(&self, path: &Path) -> Result<RasterImage> {
        debug!("解码影像文件: {:?}", path);
        let img = image::open(path).map_err(|e| {
            error!("影像文件解码失败: {:?}, 错误: {}", path, e);
            XrayError::Decode(format!("无法解码影像文件 {}: {}", path.display(), e))
        })?;
        Self::into_raster(img)
    }

    fn decode_bytes(&self, data: &[u8]) -> Result<RasterImage> {
        debug!("解码影像字节数据，大小: {} bytes", data.len());
        let img = image::load_from_memory(data).map_err(|e| {
            error!("影像字节数据解码失败: {}", e);
            XrayError::Decode(format!("无法解码影像数据: {}", e))
        })?;
        Self::into_raster(img)
    }

    fn dimensions(&self, path: &Path) -> Result<(usize, usize)> {
        let (w, h) = image::image_dimensions(path)
            .map_err(|e| XrayError::Decode(format!("无法读取影像尺寸 {}: {}", path.display(), e)))?;
        Ok((w as usize, h as usize))
    }
}
