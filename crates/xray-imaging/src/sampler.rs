//! 区域采样器
//!
//! 在图像的相对矩形区域上按固定步长抽样，计算密度、边缘复杂度、局部熵和扫描线段数。
//! 所有方法都是 (图像, 区域, 配置) 的纯函数；空区域或零面积区域一律返回 0。

use rayon::prelude::*;
use tracing::debug;
use xray_core::config::{RegionSpec, SamplerConfig};

use crate::raster::{PixelRect, RasterImage};

/// 可按区域计算的统计量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Density,
    EdgeComplexity,
    Entropy,
}

/// 区域采样器
#[derive(Debug, Clone, Copy)]
pub struct RegionSampler<'a> {
    config: &'a SamplerConfig,
}

impl<'a> RegionSampler<'a> {
    pub fn new(config: &'a SamplerConfig) -> Self {
        Self { config }
    }

    /// 计算单个统计量
    pub fn sample(&self, image: &RasterImage, statistic: Statistic, region: &RegionSpec) -> f32 {
        match statistic {
            Statistic::Density => self.density(image, region),
            Statistic::EdgeComplexity => self.edge_complexity(image, region),
            Statistic::Entropy => self.entropy(image, region),
        }
    }

    /// 并行计算一组区域统计量，结果顺序与请求一致
    pub fn sample_many(&self, image: &RasterImage, requests: &[(Statistic, RegionSpec)]) -> Vec<f32> {
        requests
            .par_iter()
            .map(|(statistic, region)| self.sample(image, *statistic, region))
            .collect()
    }

    /// 归一化平均亮度 [0, 1]
    pub fn density(&self, image: &RasterImage, region: &RegionSpec) -> f32 {
        let rect = image.resolve(region);
        if rect.is_empty() {
            return 0.0;
        }

        let stride = self.config.density_stride.max(1);
        let mut total: u64 = 0;
        let mut count: u64 = 0;

        for x in (rect.x0..rect.x1).step_by(stride) {
            for y in (rect.y0..rect.y1).step_by(stride) {
                total += image.brightness(x, y) as u64;
                count += 1;
            }
        }

        let density = if count > 0 {
            (total as f32 / count as f32) / 255.0
        } else {
            0.0
        };
        debug!("density {:?} = {:.4} ({} samples)", region, density, count);
        density
    }

    /// 边缘复杂度：采样点与右侧、下方偏移点的亮度差，超过噪声阈值时累加差值
    pub fn edge_complexity(&self, image: &RasterImage, region: &RegionSpec) -> f32 {
        let rect = image.resolve(region);
        let offset = self.config.edge_offset;
        let threshold = self.config.edge_noise_threshold;

        let mut accumulated: u64 = 0;
        let mut count: u64 = 0;

        for_each_pair_point(&rect, self.config.edge_stride, offset, |x, y| {
            let b0 = image.brightness(x, y);
            let dx = b0.abs_diff(image.brightness(x + offset, y));
            let dy = b0.abs_diff(image.brightness(x, y + offset));

            if dx > threshold {
                accumulated += dx as u64;
            }
            if dy > threshold {
                accumulated += dy as u64;
            }
            count += 1;
        });

        let edges = if count > 0 {
            (accumulated as f32 / count as f32) / self.config.edge_scale
        } else {
            0.0
        };
        debug!("edge_complexity {:?} = {:.4} ({} samples)", region, edges, count);
        edges
    }

    /// 局部熵：亮度差超过阈值的邻点对所占比例 [0, 1]
    pub fn entropy(&self, image: &RasterImage, region: &RegionSpec) -> f32 {
        let rect = image.resolve(region);
        let offset = self.config.entropy_offset;
        let threshold = self.config.entropy_threshold;

        let mut exceeding: u64 = 0;
        let mut pairs: u64 = 0;

        for_each_pair_point(&rect, self.config.entropy_stride, offset, |x, y| {
            let b0 = image.brightness(x, y);
            if b0.abs_diff(image.brightness(x + offset, y)) > threshold {
                exceeding += 1;
            }
            if b0.abs_diff(image.brightness(x, y + offset)) > threshold {
                exceeding += 1;
            }
            pairs += 2;
        });

        let entropy = if pairs > 0 {
            exceeding as f32 / pairs as f32
        } else {
            0.0
        };
        debug!("entropy {:?} = {:.4} ({} pairs)", region, entropy, pairs);
        entropy
    }

    /// 扫描线段数：在相对高度 `line_y` 的水平线上统计亮像素连续段，过窄的段视为噪声
    pub fn segment_count(&self, image: &RasterImage, line_y: f32) -> usize {
        let width = image.width();
        let height = image.height();
        if width == 0 || height == 0 {
            return 0;
        }

        let y = ((height as f32 * line_y.clamp(0.0, 1.0)) as usize).min(height - 1);
        let min_width = ((width as f32 * self.config.segment_min_width_ratio) as usize).max(1);
        let threshold = self.config.segment_threshold;

        let mut segments = 0;
        let mut run = 0;
        for x in 0..width {
            if image.brightness(x, y) > threshold {
                run += 1;
            } else {
                if run >= min_width {
                    segments += 1;
                }
                run = 0;
            }
        }
        if run >= min_width {
            segments += 1;
        }

        debug!("segment_count y={} = {} (min width {})", y, segments, min_width);
        segments
    }
}

/// 遍历矩形内的采样点，保证右侧与下方偏移点仍在矩形内
fn for_each_pair_point<F>(rect: &PixelRect, stride: usize, offset: usize, mut f: F)
where
    F: FnMut(usize, usize),
{
    if rect.width() <= offset || rect.height() <= offset {
        return;
    }

    let stride = stride.max(1);
    for x in (rect.x0..rect.x1 - offset).step_by(stride) {
        for y in (rect.y0..rect.y1 - offset).step_by(stride) {
            f(x, y);
        }
    }
}
