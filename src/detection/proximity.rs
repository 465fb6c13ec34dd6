//! 人员间 3D 距离判定

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{Person, ProximityAlert};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// 安全距离 (米), 小于该值告警
    pub distance_threshold: f32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProximityEvaluator {
    config: ProximityConfig,
}

impl ProximityEvaluator {
    pub fn new(config: ProximityConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f32 {
        self.config.distance_threshold
    }

    /// 所有 i < j 的人员对, 按遍历顺序输出告警
    ///
    /// 位置由框中心像素 + 该处深度反投影得到, 是纯函数, 这里直接复用 `Person::position`
    pub fn evaluate(&self, persons: &[Person]) -> Vec<ProximityAlert> {
        let mut alerts = Vec::new();
        for (i, a) in persons.iter().enumerate() {
            for b in &persons[i + 1..] {
                let distance_m = a.position.distance(&b.position);
                if distance_m < self.config.distance_threshold {
                    alerts.push(ProximityAlert {
                        person_a: a.id,
                        person_b: b.id,
                        distance_m,
                    });
                }
            }
        }
        alerts
    }
}

/// 出现在任一告警中的人员 ID
pub fn alerted_ids(alerts: &[ProximityAlert]) -> BTreeSet<u32> {
    alerts
        .iter()
        .flat_map(|a| [a.person_a, a.person_b])
        .collect()
}
