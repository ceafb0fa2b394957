use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// 风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// 单次准确性分析的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisOutcome {
    /// 准确率 (0-100)
    pub accuracy: f64,
    pub risk_level: RiskLevel,
    pub hallucination_count: u32,
    #[serde(default)]
    pub processing_time_ms: u64,
    /// 为 true 时表示分析服务不可用，由回退策略生成
    #[serde(default)]
    pub synthetic: bool,
}

impl AnalysisOutcome {
    /// 重试耗尽后的合成结果，仅在显式开启回退策略时使用
    pub fn synthetic(processing_time_ms: u64) -> Self {
        Self {
            accuracy: 50.0,
            risk_level: RiskLevel::Medium,
            hallucination_count: 0,
            processing_time_ms,
            synthetic: true,
        }
    }

    /// 校验分析服务返回的数据
    pub fn validate(&self) -> AppResult<()> {
        if !self.accuracy.is_finite() || !(0.0..=100.0).contains(&self.accuracy) {
            return Err(AppError::validation(format!(
                "分析结果准确率超出范围: {}",
                self.accuracy
            )));
        }
        Ok(())
    }
}

/// 带标签的内容片段，来自一个数据源或云盘文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSection {
    pub label: String,
    pub text: String,
    /// 为 true 时 text 是错误占位内容
    pub failed: bool,
}

impl ContentSection {
    pub fn content<L: Into<String>, T: Into<String>>(label: L, text: T) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            failed: false,
        }
    }

    /// 读取失败时的占位片段，失败被记录而不是丢弃
    pub fn placeholder<L: Into<String>>(label: L, error: &str) -> Self {
        Self {
            label: label.into(),
            text: format!("[内容获取失败: {}]", error),
            failed: true,
        }
    }

    /// 读取成功但内容为空
    pub fn empty<L: Into<String>>(label: L) -> Self {
        Self {
            label: label.into(),
            text: "[内容为空]".to_string(),
            failed: false,
        }
    }

    /// 拼接为提交给分析服务的单个文本
    pub fn join(sections: &[ContentSection]) -> String {
        sections
            .iter()
            .map(|s| format!("=== {} ===\n{}", s.label, s.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
