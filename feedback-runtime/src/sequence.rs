//! # Sequence 模块
//!
//! 带时间戳的触发音符序列，以及按 BPM 量化的算法。
//!
//! 反馈可以绑定一个序列和其中的一条轨道：播放时不再单次触发，
//! 而是按轨道上每个音符的时间点依次触发（见 `feedback::task`）。
//!
//! ## 量化
//!
//! 量化以 `beat_duration = 60 / bpm` 为步长生成节拍时间数组
//! `[0, beat, 2·beat, ...]`（长度为 `floor(length / beat_duration)`），
//! 每个原始音符吸附到数组中最近的节拍上；每条轨道得到一个等长数组，
//! 槽位为 `-1`（无音符）或该轨道的 ID。

use serde::{Deserialize, Serialize};

use crate::error::SequenceError;

/// 量化后空槽位的 ID
pub const EMPTY_SLOT: i32 = -1;

/// 序列音符
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceNote {
    /// 时间戳（秒）
    pub timestamp: f32,
    /// 所属轨道 ID
    pub id: i32,
}

impl SequenceNote {
    pub fn new(timestamp: f32, id: i32) -> Self {
        Self { timestamp, id }
    }
}

/// 序列轨道
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceTrack {
    /// 轨道 ID
    pub id: i32,
    /// 是否启用
    #[serde(default = "default_true")]
    pub active: bool,
    /// 轨道名称（仅用于展示）
    #[serde(default)]
    pub name: String,
}

impl SequenceTrack {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            active: true,
            name: String::new(),
        }
    }
}

/// 触发序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// 序列名称
    #[serde(default)]
    pub name: String,
    /// 原始音符（可乱序，`sort_original_sequence` 后按时间排序）
    #[serde(default)]
    pub notes: Vec<SequenceNote>,
    /// 最后一个音符之后的静音时长
    #[serde(default)]
    pub end_silence_duration: f32,
    /// 声明的轨道
    #[serde(default)]
    pub tracks: Vec<SequenceTrack>,
    /// 是否已量化
    #[serde(default)]
    pub quantized: bool,
    /// 量化目标 BPM
    #[serde(default = "default_bpm")]
    pub target_bpm: u32,
    /// 序列总长（秒），由 `compute_length` 计算
    #[serde(default)]
    pub length: f32,
    /// 量化结果：每条轨道一个按节拍展开的数组
    #[serde(default)]
    pub quantized_sequence: Vec<Vec<SequenceNote>>,
}

fn default_true() -> bool {
    true
}

fn default_bpm() -> u32 {
    120
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            name: String::new(),
            notes: Vec::new(),
            end_silence_duration: 0.0,
            tracks: Vec::new(),
            quantized: false,
            target_bpm: default_bpm(),
            length: 0.0,
            quantized_sequence: Vec::new(),
        }
    }
}

impl Sequence {
    /// 创建空序列
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 添加音符
    pub fn with_note(mut self, timestamp: f32, id: i32) -> Self {
        self.notes.push(SequenceNote::new(timestamp, id));
        self
    }

    /// 添加轨道
    pub fn with_track(mut self, id: i32) -> Self {
        self.tracks.push(SequenceTrack::new(id));
        self
    }

    /// 设置结尾静音时长
    pub fn with_end_silence(mut self, duration: f32) -> Self {
        self.end_silence_duration = duration;
        self
    }

    /// 按时间戳排序原始音符
    pub fn sort_original_sequence(&mut self) {
        self.notes.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }

    /// 计算序列长度：最后一个音符的时间戳 + 结尾静音
    ///
    /// 没有音符时长度只等于静音时长。
    pub fn compute_length(&mut self) {
        let last = self.notes.last().map(|n| n.timestamp).unwrap_or(0.0);
        self.length = last + self.end_silence_duration;
    }

    /// 节拍间隔（秒）
    pub fn beat_duration(&self) -> f32 {
        60.0 / self.target_bpm.max(1) as f32
    }

    /// 节拍数量
    pub fn beat_count(&self) -> usize {
        if self.target_bpm == 0 {
            return 0;
        }
        (self.length / self.beat_duration()).floor().max(0.0) as usize
    }

    /// 量化原始序列：计算长度后按 `target_bpm` 量化
    pub fn quantize_original_sequence(&mut self) -> Result<(), SequenceError> {
        self.validate()?;
        self.compute_length();
        let notes = self.notes.clone();
        self.quantize_to_bpm(&notes);
        Ok(())
    }

    /// 将给定音符量化到当前 `target_bpm`
    ///
    /// 结果写入 `quantized_sequence`，每条声明的轨道一个数组，长度为节拍数量。
    pub fn quantize_to_bpm(&mut self, base: &[SequenceNote]) {
        let beat_duration = self.beat_duration();
        let beats: Vec<f32> = (0..self.beat_count())
            .map(|i| i as f32 * beat_duration)
            .collect();

        // 每个音符只需吸附一次
        let snapped: Vec<(f32, i32)> = base
            .iter()
            .filter_map(|note| round_to_array(note.timestamp, &beats).map(|t| (t, note.id)))
            .collect();

        self.quantized_sequence = self
            .tracks
            .iter()
            .map(|track| {
                beats
                    .iter()
                    .map(|&beat| {
                        let hit = snapped
                            .iter()
                            .any(|&(t, id)| t == beat && id == track.id);
                        SequenceNote::new(beat, if hit { track.id } else { EMPTY_SLOT })
                    })
                    .collect()
            })
            .collect();
    }

    /// 量化序列的节拍数（第一条轨道的长度）
    pub fn quantized_beat_count(&self) -> usize {
        self.quantized_sequence.first().map_or(0, Vec::len)
    }

    /// 某个节拍上是否有任意轨道命中指定 ID
    pub fn quantized_hit(&self, beat: usize, track_id: i32) -> bool {
        self.quantized_sequence
            .iter()
            .any(|line| line.get(beat).is_some_and(|note| note.id == track_id))
    }

    /// 指定轨道在 `(from, to]` 时间窗内的音符数量
    pub fn notes_in_window(&self, track_id: i32, from: f32, to: f32) -> usize {
        self.notes
            .iter()
            .filter(|n| n.id == track_id && n.timestamp > from && n.timestamp <= to)
            .count()
    }

    /// 校验序列
    pub fn validate(&self) -> Result<(), SequenceError> {
        if self.notes.is_empty() {
            return Err(SequenceError::Empty {
                name: self.name.clone(),
            });
        }
        if self.target_bpm == 0 {
            return Err(SequenceError::ZeroBpm {
                name: self.name.clone(),
            });
        }
        if self.end_silence_duration < 0.0 {
            return Err(SequenceError::NegativeSilence {
                name: self.name.clone(),
                value: self.end_silence_duration,
            });
        }
        Ok(())
    }
}

/// 在升序数组中查找与 `value` 最近的元素（二分查找）
///
/// 超出数组两端时取边界值；距离相等时取较大者。数组为空返回 `None`。
pub fn round_to_array(value: f32, array: &[f32]) -> Option<f32> {
    let first = *array.first()?;
    let last = *array.last()?;
    if first >= value {
        return Some(first);
    }
    if last <= value {
        return Some(last);
    }

    let mut min = 0;
    let mut max = array.len() - 1;
    while max - min > 1 {
        let mid = (max + min) / 2;
        if array[mid] == value {
            return Some(array[mid]);
        } else if array[mid] < value {
            min = mid;
        } else {
            max = mid;
        }
    }

    if array[max] - value <= value - array[min] {
        Some(array[max])
    } else {
        Some(array[min])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_sequence() -> Sequence {
        Sequence::new("demo")
            .with_note(0.99, 0)
            .with_note(0.02, 0)
            .with_note(0.51, 0)
            .with_track(0)
            .with_end_silence(0.6)
    }

    #[test]
    fn test_sort_and_length() {
        let mut seq = demo_sequence();
        seq.sort_original_sequence();
        let stamps: Vec<f32> = seq.notes.iter().map(|n| n.timestamp).collect();
        assert_eq!(stamps, vec![0.02, 0.51, 0.99]);

        seq.compute_length();
        assert!((seq.length - 1.59).abs() < 1e-5);
    }

    #[test]
    fn test_round_to_array() {
        let beats = [0.0, 0.5, 1.0];
        assert_eq!(round_to_array(0.02, &beats), Some(0.0));
        assert_eq!(round_to_array(0.51, &beats), Some(0.5));
        assert_eq!(round_to_array(0.99, &beats), Some(1.0));
        // 超出两端取边界
        assert_eq!(round_to_array(-3.0, &beats), Some(0.0));
        assert_eq!(round_to_array(7.0, &beats), Some(1.0));
        // 正中间取较大者
        assert_eq!(round_to_array(0.25, &beats), Some(0.5));
        assert_eq!(round_to_array(0.3, &[]), None);
    }

    #[test]
    fn test_quantize_snaps_to_nearest_beat() {
        let mut seq = demo_sequence();
        seq.sort_original_sequence();
        seq.quantize_original_sequence().unwrap();

        assert_eq!(seq.beat_count(), 3);
        let ids: Vec<i32> = seq.quantized_sequence[0].iter().map(|n| n.id).collect();
        insta::assert_debug_snapshot!(ids, @r"
        [
            0,
            0,
            0,
        ]
        ");
        let stamps: Vec<f32> = seq.quantized_sequence[0]
            .iter()
            .map(|n| n.timestamp)
            .collect();
        assert_eq!(stamps, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_quantize_one_line_per_track() {
        let mut seq = Sequence::new("two")
            .with_note(0.0, 1)
            .with_note(1.0, 2)
            .with_track(1)
            .with_track(2)
            .with_end_silence(1.0);
        seq.quantize_original_sequence().unwrap();

        // length = 2.0 → 4 个节拍
        assert_eq!(seq.quantized_sequence.len(), 2);
        assert!(seq.quantized_sequence.iter().all(|l| l.len() == 4));

        let line = |i: usize| -> Vec<i32> {
            seq.quantized_sequence[i].iter().map(|n| n.id).collect()
        };
        assert_eq!(line(0), vec![1, -1, -1, -1]);
        assert_eq!(line(1), vec![-1, -1, 2, -1]);
        assert!(seq.quantized_hit(2, 2));
        assert!(!seq.quantized_hit(1, 2));
    }

    #[test]
    fn test_quantize_too_short_is_empty() {
        // 长度不足一个节拍时没有槽位，也不会越界
        let mut seq = Sequence::new("short").with_note(0.1, 0).with_track(0);
        seq.quantize_original_sequence().unwrap();
        assert_eq!(seq.beat_count(), 0);
        assert_eq!(seq.quantized_beat_count(), 0);
    }

    #[test]
    fn test_notes_in_window() {
        let seq = demo_sequence().with_note(0.5, 1);
        assert_eq!(seq.notes_in_window(0, f32::NEG_INFINITY, 0.02), 1);
        assert_eq!(seq.notes_in_window(0, 0.02, 0.51), 1);
        assert_eq!(seq.notes_in_window(0, 0.51, f32::INFINITY), 1);
        assert_eq!(seq.notes_in_window(1, 0.0, 1.0), 1);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            Sequence::new("empty").validate(),
            Err(SequenceError::Empty { .. })
        ));

        let mut seq = demo_sequence();
        seq.target_bpm = 0;
        assert!(matches!(seq.validate(), Err(SequenceError::ZeroBpm { .. })));
    }

    #[test]
    fn test_deserialize_defaults() {
        let seq: Sequence =
            serde_json::from_str(r#"{"notes":[{"timestamp":0.5,"id":3}]}"#).unwrap();
        assert_eq!(seq.target_bpm, 120);
        assert!(!seq.quantized);
        assert_eq!(seq.notes.len(), 1);
    }
}
