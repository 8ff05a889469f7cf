//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 这里只提取流信息需要的字段: 裁剪后的图像尺寸、场/帧编码方式、
//! 像素宽高比 (SAR) 和 VUI 中的帧率. 量化矩阵只做跳过.

use liu_core::bitreader::BitReader;
use liu_core::{LiuError, LiuResult};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct Sps {
    /// profile_idc (如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// level_idc (如 30=3.0, 41=4.1)
    pub level_idc: u8,
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 图像宽度 (像素, 已应用 cropping)
    pub width: u32,
    /// 图像高度 (像素, 已应用 cropping)
    pub height: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// SAR (分子, 分母), 未指定时为 (1, 1)
    pub sar: (u32, u32),
    /// VUI timing_info: (num_units_in_tick, time_scale)
    pub timing: Option<(u32, u32)>,
}

impl Sps {
    /// 帧率 (scale, rate), 即 fps = rate / scale
    ///
    /// H.264 定义 fps = time_scale / (2 * num_units_in_tick).
    pub fn frame_rate(&self) -> Option<(u32, u32)> {
        self.timing
            .map(|(num_units, time_scale)| (num_units.saturating_mul(2), time_scale))
    }

    /// 显示宽高比 = (width * sar_w) / (height * sar_h)
    pub fn display_aspect(&self) -> f32 {
        let (sar_w, sar_h) = self.sar;
        if self.height == 0 || sar_h == 0 {
            return 0.0;
        }
        (f64::from(self.width) * f64::from(sar_w) / (f64::from(self.height) * f64::from(sar_h)))
            as f32
    }
}

/// 预定义的 SAR 表 (ITU-T H.264 表 E-1)
const SAR_TABLE: [(u32, u32); 17] = [
    (0, 1),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

/// 从 RBSP 数据解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> LiuResult<Sps> {
    if rbsp.len() < 3 {
        return Err(LiuError::InvalidData("H.264: SPS RBSP 太短".into()));
    }

    let mut br = BitReader::new(rbsp);

    let profile_idc = br.read_bits(8)? as u8;
    br.skip_bits(8)?; // constraint_set 标志
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue()?;
    if sps_id > 31 {
        return Err(LiuError::InvalidData(format!(
            "H.264: sps_id 超出范围, sps_id={sps_id}"
        )));
    }

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;

    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue()?;
        if chroma_format_idc > 3 {
            return Err(LiuError::InvalidData(format!(
                "H.264: chroma_format_idc 非法, value={chroma_format_idc}"
            )));
        }
        if chroma_format_idc == 3 {
            separate_colour_plane = br.read_flag()?;
        }
        br.read_ue()?; // bit_depth_luma_minus8
        br.read_ue()?; // bit_depth_chroma_minus8
        br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        if br.read_flag()? {
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for idx in 0..list_count {
                if br.read_flag()? {
                    skip_scaling_list(&mut br, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    br.read_ue()?; // log2_max_frame_num_minus4

    let poc_type = br.read_ue()?;
    match poc_type {
        0 => {
            br.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            br.skip_bits(1)?; // delta_pic_order_always_zero_flag
            br.read_se()?; // offset_for_non_ref_pic
            br.read_se()?; // offset_for_top_to_bottom_field
            let cycle = br.read_ue()?;
            if cycle > 255 {
                return Err(LiuError::InvalidData(format!(
                    "H.264: num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={cycle}"
                )));
            }
            for _ in 0..cycle {
                br.read_se()?;
            }
        }
        2 => {}
        _ => {
            return Err(LiuError::InvalidData(format!(
                "H.264: pic_order_cnt_type 非法, value={poc_type}"
            )));
        }
    }

    br.read_ue()?; // max_num_ref_frames
    br.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = br.read_ue()? + 1;
    let pic_height_in_map_units = br.read_ue()? + 1;

    let frame_mbs_only = br.read_flag()?;
    if !frame_mbs_only {
        br.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1)?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if br.read_flag()? {
        crop_left = br.read_ue()?;
        crop_right = br.read_ue()?;
        crop_top = br.read_ue()?;
        crop_bottom = br.read_ue()?;
    }

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let overflow = || LiuError::InvalidData("H.264: 计算图像尺寸时发生溢出".into());
    let raw_width = pic_width_in_mbs.checked_mul(16).ok_or_else(overflow)?;
    let raw_height = pic_height_in_map_units
        .checked_mul(if frame_mbs_only { 16 } else { 32 })
        .ok_or_else(overflow)?;
    let crop_x = crop_left
        .checked_add(crop_right)
        .and_then(|v| v.checked_mul(crop_unit_x))
        .ok_or_else(overflow)?;
    let crop_y = crop_top
        .checked_add(crop_bottom)
        .and_then(|v| v.checked_mul(crop_unit_y))
        .ok_or_else(overflow)?;
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(LiuError::InvalidData(format!(
            "H.264: 裁剪参数非法, raw={raw_width}x{raw_height}, crop_x={crop_x}, crop_y={crop_y}"
        )));
    }

    let mut sar = (1, 1);
    let mut timing = None;
    if br.read_flag()? {
        (sar, timing) = parse_vui(&mut br)?;
    }

    Ok(Sps {
        profile_idc,
        level_idc,
        sps_id,
        chroma_format_idc,
        width: raw_width - crop_x,
        height: raw_height - crop_y,
        frame_mbs_only,
        sar,
        timing,
    })
}

/// 是否为 High Profile 或更高
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// cropping 单位 (水平, 垂直)
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u32, u32) {
    let sub_width = match chroma_array_type {
        1 | 2 => 2,
        _ => 1,
    };
    let sub_height = if chroma_array_type == 1 { 2 } else { 1 };
    let field_mult = if frame_mbs_only { 1 } else { 2 };
    (sub_width, sub_height * field_mult)
}

/// 跳过一个 scaling_list()
fn skip_scaling_list(br: &mut BitReader, size: usize) -> LiuResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = br.read_se()?;
            next_scale = (last_scale + delta + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// 解析 VUI 参数中的 SAR 和 timing_info
fn parse_vui(br: &mut BitReader) -> LiuResult<((u32, u32), Option<(u32, u32)>)> {
    let mut sar = (1, 1);

    // aspect_ratio_info_present_flag
    if br.read_flag()? {
        let ar_idc = br.read_bits(8)? as usize;
        if ar_idc == 255 {
            let sar_w = br.read_bits(16)?;
            let sar_h = br.read_bits(16)?;
            if sar_w != 0 && sar_h != 0 {
                sar = (sar_w, sar_h);
            }
        } else if let Some(&(w, h)) = SAR_TABLE.get(ar_idc) {
            if w > 0 {
                sar = (w, h);
            }
        } else {
            return Err(LiuError::InvalidData(format!(
                "H.264: VUI aspect_ratio_idc 非法, value={ar_idc}"
            )));
        }
    }

    // overscan_info_present_flag
    if br.read_flag()? {
        br.skip_bits(1)?;
    }

    // video_signal_type_present_flag
    if br.read_flag()? {
        br.skip_bits(4)?; // video_format + video_full_range_flag
        if br.read_flag()? {
            br.skip_bits(24)?; // colour_primaries, transfer, matrix
        }
    }

    // chroma_loc_info_present_flag
    if br.read_flag()? {
        br.read_ue()?;
        br.read_ue()?;
    }

    let mut timing = None;
    if br.read_flag()? {
        let num_units = br.read_bits(32)?;
        let time_scale = br.read_bits(32)?;
        br.skip_bits(1)?; // fixed_frame_rate_flag
        if num_units != 0 && time_scale != 0 {
            timing = Some((num_units, time_scale));
        }
    }

    Ok((sar, timing))
}
