//! 2D + 3D 重复检测合并
//!
//! 同一个人被多个 anchor 检出 (或部分遮挡拆成多个框) 时, 合并为一个.
//! 判定: (IoU > iou_merge 且 3D 距离 < dist3d_merge) 或 框中心像素距离 < pixel_center_merge

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::Person;
use crate::geometry::center_distance;

/// 合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// 单趟贪心: 靠后的并入靠前的, 不做传递闭包 (A~B, B~C 时 C 可能保留)
    #[default]
    Greedy,
    /// 传递闭包: 所有成对关系连通的候选合并为一个, 保留最靠前的一个.
    /// 与 Greedy 结果不同, 属于行为变更, 需显式开启
    Transitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub iou_merge_threshold: f32,
    /// 米
    pub dist3d_merge_threshold: f32,
    /// 像素
    pub pixel_center_merge_threshold: f32,
    pub mode: MergeMode,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            iou_merge_threshold: 0.25,
            dist3d_merge_threshold: 0.35,
            pixel_center_merge_threshold: 140.0,
            mode: MergeMode::Greedy,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpatialDeduplicator {
    config: DedupConfig,
}

impl SpatialDeduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// `b` 是否为 `a` 的重复检测
    pub fn is_duplicate(&self, a: &Person, b: &Person) -> bool {
        let overlapping_and_close = a.bbox.iou(&b.bbox) > self.config.iou_merge_threshold
            && a.position.distance(&b.position) < self.config.dist3d_merge_threshold;
        overlapping_and_close
            || center_distance(&a.bbox, &b.bbox) < self.config.pixel_center_merge_threshold
    }

    /// 去重, 幸存者保持原有相对顺序
    pub fn dedup(&self, persons: Vec<Person>) -> Vec<Person> {
        let before = persons.len();
        let skip = match self.config.mode {
            MergeMode::Greedy => self.greedy_skip(&persons),
            MergeMode::Transitive => self.transitive_skip(&persons),
        };

        let survivors: Vec<Person> = persons
            .into_iter()
            .zip(skip)
            .filter(|(_, skipped)| !skipped)
            .map(|(p, _)| p)
            .collect();

        if survivors.len() != before {
            debug!("dedup: {} → {} persons", before, survivors.len());
        }
        survivors
    }

    fn greedy_skip(&self, persons: &[Person]) -> Vec<bool> {
        let mut skip = vec![false; persons.len()];
        for i in 0..persons.len() {
            if skip[i] {
                continue;
            }
            for j in (i + 1)..persons.len() {
                if skip[j] {
                    continue;
                }
                if self.is_duplicate(&persons[i], &persons[j]) {
                    skip[j] = true;
                }
            }
        }
        skip
    }

    fn transitive_skip(&self, persons: &[Person]) -> Vec<bool> {
        // 并查集, 根始终是分量中下标最小的成员
        let mut parent: Vec<usize> = (0..persons.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for i in 0..persons.len() {
            for j in (i + 1)..persons.len() {
                if self.is_duplicate(&persons[i], &persons[j]) {
                    let ri = find(&mut parent, i);
                    let rj = find(&mut parent, j);
                    if ri != rj {
                        let (lo, hi) = if ri < rj { (ri, rj) } else { (rj, ri) };
                        parent[hi] = lo;
                    }
                }
            }
        }

        (0..persons.len())
            .map(|i| find(&mut parent, i) != i)
            .collect()
    }
}
