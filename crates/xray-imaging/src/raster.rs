//! 栅格图像
//!
//! 解码后的RGB像素网格，创建后不可修改。

use xray_core::config::RegionSpec;
use xray_core::{Result, XrayError};

/// 一次上传扫描的RGB像素网格
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 3]>,
}

impl RasterImage {
    /// 从紧密排列的RGB字节创建图像
    pub fn from_rgb(width: usize, height: usize, data: &[u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(XrayError::Validation(format!(
                "图像尺寸必须为正数: {}x{}",
                width, height
            )));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| {
                XrayError::Validation(format!("图像尺寸溢出: {}x{}", width, height))
            })?;
        if data.len() != expected {
            return Err(XrayError::Validation(format!(
                "像素数据长度不匹配: 期望 {} 字节, 实际 {} 字节",
                expected,
                data.len()
            )));
        }

        let pixels = data
            .chunks_exact(3)
            .map(|px| [px[0], px[1], px[2]])
            .collect();

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 按坐标函数生成图像
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> [u8; 3],
    {
        if width == 0 || height == 0 {
            return Err(XrayError::Validation(format!(
                "图像尺寸必须为正数: {}x{}",
                width, height
            )));
        }

        let count = width.checked_mul(height).ok_or_else(|| {
            XrayError::Validation(format!("图像尺寸溢出: {}x{}", width, height))
        })?;
        let mut pixels = Vec::with_capacity(count);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 灰度函数生成图像
    pub fn from_gray_fn<F>(width: usize, height: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> u8,
    {
        Self::from_fn(width, height, |x, y| {
            let v = f(x, y);
            [v, v, v]
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// 宽高比 (width / height)
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        self.pixels[y * self.width + x]
    }

    /// 三通道整数平均亮度
    pub fn brightness(&self, x: usize, y: usize) -> u8 {
        let [r, g, b] = self.pixel(x, y);
        ((r as u16 + g as u16 + b as u16) / 3) as u8
    }

    /// 将相对区域换算为像素矩形，超出部分被裁剪
    pub fn resolve(&self, region: &RegionSpec) -> PixelRect {
        let to_px = |fraction: f32, extent: usize| -> usize {
            if fraction <= 0.0 {
                0
            } else {
                ((extent as f32 * fraction) as usize).min(extent)
            }
        };

        let x0 = to_px(region.x, self.width);
        let y0 = to_px(region.y, self.height);
        let x1 = (x0 + to_px(region.w, self.width)).min(self.width);
        let y1 = (y0 + to_px(region.h, self.height)).min(self.height);

        PixelRect { x0, y0, x1, y1 }
    }
}

/// 半开像素矩形 `[x0, x1) × [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelRect {
    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_buffers() {
        assert!(RasterImage::from_rgb(0, 10, &[]).is_err());
        assert!(RasterImage::from_rgb(2, 2, &[0; 11]).is_err());
        assert!(RasterImage::from_rgb(2, 2, &[0; 12]).is_ok());
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let err = RasterImage::from_rgb(usize::MAX, 2, &[0; 12]).unwrap_err();
        assert!(matches!(err, XrayError::Validation(_)));

        let err = RasterImage::from_gray_fn(usize::MAX, 2, |_, _| 0).unwrap_err();
        assert!(matches!(err, XrayError::Validation(_)));
    }

    #[test]
    fn test_brightness_is_channel_average() {
        let img = RasterImage::from_rgb(1, 1, &[30, 60, 91]).unwrap();
        assert_eq!(img.brightness(0, 0), 60);
    }

    #[test]
    fn test_region_resolution() {
        let img = RasterImage::from_gray_fn(200, 100, |_, _| 0).unwrap();

        let rect = img.resolve(&RegionSpec::new(0.05, 0.05, 0.15, 0.15));
        assert_eq!(rect, PixelRect { x0: 10, y0: 5, x1: 40, y1: 20 });

        let full = img.resolve(&RegionSpec::full());
        assert_eq!(full, PixelRect { x0: 0, y0: 0, x1: 200, y1: 100 });

        let empty = img.resolve(&RegionSpec::new(0.5, 0.5, 0.0, 0.2));
        assert!(empty.is_empty());
    }
}
