//! 测试用合成影像

use std::path::Path;
use xray_imaging::RasterImage;

/// 由灰度函数定义的合成影像
pub(crate) struct Phantom {
    pub width: usize,
    pub height: usize,
    shade: fn(usize, usize) -> u8,
}

impl Phantom {
    pub fn raster(&self) -> RasterImage {
        RasterImage::from_gray_fn(self.width, self.height, self.shade).unwrap()
    }

    pub fn write_png(&self, path: &Path) {
        let shade = self.shade;
        let img = image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = shade(x as usize, y as usize);
            image::Rgb([v, v, v])
        });
        img.save(path).unwrap();
    }
}

fn lungs(x: usize, y: usize, level: u8) -> u8 {
    if (60..200).contains(&x) && (60..180).contains(&y) {
        if (x / 4) % 2 == 0 {
            level
        } else {
            level - 60
        }
    } else {
        200
    }
}

/// 横幅胸片，肺野透亮
pub(crate) fn clear_chest() -> Phantom {
    Phantom {
        width: 260,
        height: 200,
        shade: |x, y| lungs(x, y, 120),
    }
}

/// 横幅胸片，肺野大片致密影
pub(crate) fn opaque_chest() -> Phantom {
    Phantom {
        width: 260,
        height: 200,
        shade: |x, y| lungs(x, y, 240),
    }
}

fn hand(x: usize, y: usize, palm: fn(usize, usize) -> u8) -> u8 {
    const FINGERS: [(usize, usize); 5] = [(26, 40), (62, 76), (98, 112), (134, 148), (170, 184)];
    if y < 150 {
        if FINGERS.iter().any(|&(a, b)| (a..b).contains(&x)) {
            220
        } else {
            30
        }
    } else if (26..184).contains(&x) {
        palm(x, y)
    } else {
        30
    }
}

/// 五指张开的手部正位片
pub(crate) fn healthy_hand() -> Phantom {
    Phantom {
        width: 200,
        height: 240,
        shade: |x, y| hand(x, y, |_, _| 220),
    }
}

/// 掌骨区域碎裂的手部片
pub(crate) fn fractured_hand() -> Phantom {
    Phantom {
        width: 200,
        height: 240,
        shade: |x, y| {
            hand(x, y, |x, y| if (x / 4 + y / 4) % 2 == 0 { 220 } else { 60 })
        },
    }
}

/// 单根完整长骨
pub(crate) fn healthy_leg() -> Phantom {
    Phantom {
        width: 130,
        height: 300,
        shade: |x, _| if (49..86).contains(&x) { 210 } else { 25 },
    }
}

/// 骨干中段碎裂的长骨
pub(crate) fn fractured_leg() -> Phantom {
    Phantom {
        width: 130,
        height: 300,
        shade: |x, y| {
            if !(49..86).contains(&x) {
                25
            } else if (120..180).contains(&y) && (x / 4 + y / 4) % 2 == 1 {
                40
            } else {
                210
            }
        },
    }
}

/// 无法识别部位的条纹图
pub(crate) fn unrecognizable() -> Phantom {
    Phantom {
        width: 100,
        height: 100,
        shade: |x, _| if (x / 4) % 2 == 0 { 130 } else { 60 },
    }
}

/// 均匀中灰，对比度不足
pub(crate) fn flat_gray() -> Phantom {
    Phantom {
        width: 100,
        height: 100,
        shade: |_, _| 128,
    }
}
