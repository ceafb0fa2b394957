use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    models::{ContentSection, DriveFileRef, ScheduledScan},
    services::{
        dispatcher::BoundedDispatcher,
        providers::{FileSourceProvider, NamedSourceProvider},
    },
};

enum ContentInput<'a> {
    DriveFile(&'a DriveFileRef),
    Source(&'a str),
}

impl ContentInput<'_> {
    fn label(&self) -> &str {
        match self {
            ContentInput::DriveFile(file) => file.file_name.as_str(),
            ContentInput::Source(id) => *id,
        }
    }
}

/// 单个扫描的内容收集器
///
/// 每个声明的云盘文件与数据源各尝试一次，全部经由共享调度器并发执行。
/// 单个来源失败只会产生占位片段，不影响其他来源。
#[derive(Clone)]
pub struct ContentAggregator {
    files: Arc<dyn FileSourceProvider>,
    sources: Arc<dyn NamedSourceProvider>,
    dispatcher: Arc<BoundedDispatcher>,
}

impl ContentAggregator {
    pub fn new(
        files: Arc<dyn FileSourceProvider>,
        sources: Arc<dyn NamedSourceProvider>,
        dispatcher: Arc<BoundedDispatcher>,
    ) -> Self {
        Self {
            files,
            sources,
            dispatcher,
        }
    }

    /// 收集内容片段，顺序为云盘文件在前、数据源在后
    ///
    /// 未声明任何来源时返回空列表；否则结果长度等于声明的来源数。
    pub async fn gather(
        &self,
        scan: &ScheduledScan,
        deadline: Option<Instant>,
    ) -> Vec<ContentSection> {
        if scan.input_count() == 0 {
            return Vec::new();
        }

        let inputs: Vec<ContentInput<'_>> = scan
            .drive_files
            .iter()
            .map(ContentInput::DriveFile)
            .chain(scan.sources.iter().map(|s| ContentInput::Source(s)))
            .collect();

        let sections =
            join_all(inputs.iter().map(|input| self.fetch_one(input, deadline))).await;

        let failed = sections.iter().filter(|s| s.failed).count();
        debug!(
            scan_id = %scan.id,
            total = sections.len(),
            failed,
            "内容收集完成"
        );
        sections
    }

    async fn fetch_one(
        &self,
        input: &ContentInput<'_>,
        deadline: Option<Instant>,
    ) -> ContentSection {
        let label = input.label();
        let result = match input {
            ContentInput::DriveFile(file) => {
                self.dispatcher
                    .submit_until(&format!("云盘文件[{}]", file.file_name), deadline, || {
                        self.files.fetch_drive_file(&file.file_id)
                    })
                    .await
            }
            ContentInput::Source(id) => {
                self.dispatcher
                    .submit_until(&format!("数据源[{}]", id), deadline, || {
                        self.sources.fetch_source(id)
                    })
                    .await
            }
        };

        match result {
            Ok(text) if text.trim().is_empty() => ContentSection::empty(label),
            Ok(text) => ContentSection::content(label, text),
            Err(e) => {
                let reason = e
                    .source_error()
                    .map(|source| source.to_string())
                    .unwrap_or_else(|| e.to_string());
                warn!("内容来源 {} 获取失败，使用占位内容: {}", label, reason);
                ContentSection::placeholder(label, &reason)
            }
        }
    }
}
