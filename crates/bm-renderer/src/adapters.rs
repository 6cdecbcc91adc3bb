//! Platform adapters: per-destination stage lists.

use std::collections::HashMap;

use crate::request::Platform;
use crate::stages::{
    CodeWhitespace, FootnoteRewriter, ListItemUnwrap, Stage, TaskListGlyphs, UnwrapScope,
};

/// Hosts whose links survive the WeChat editor.
pub const WECHAT_ALLOWED_HOSTS: &[&str] = &["mp.weixin.qq.com"];

/// Ordered stages for one platform.
pub struct PlatformAdapter {
    platform: Platform,
    stages: Vec<Box<dyn Stage>>,
}

impl PlatformAdapter {
    #[must_use]
    pub fn new(platform: Platform, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { platform, stages }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    /// Stage names in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

/// Adapters for every platform, built once and shared read-only.
pub struct AdapterTable {
    adapters: HashMap<Platform, PlatformAdapter>,
}

impl AdapterTable {
    /// Table with the stock WeChat allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allowed_hosts(WECHAT_ALLOWED_HOSTS.iter().copied())
    }

    /// Table whose WeChat adapter keeps links to `hosts` (exact match).
    #[must_use]
    pub fn with_allowed_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts: Vec<String> = hosts.into_iter().map(Into::into).collect();
        let adapters = Platform::ALL
            .into_iter()
            .map(|platform| {
                let stages: Vec<Box<dyn Stage>> = match platform {
                    Platform::Wechat => vec![
                        Box::new(TaskListGlyphs),
                        Box::new(ListItemUnwrap::new(UnwrapScope::LeadingParagraph)),
                        Box::new(CodeWhitespace),
                        Box::new(FootnoteRewriter::stripped(hosts.clone())),
                    ],
                    Platform::Zhihu => vec![Box::new(TaskListGlyphs)],
                    Platform::Html | Platform::Juejin => Vec::new(),
                };
                (platform, PlatformAdapter::new(platform, stages))
            })
            .collect();
        Self { adapters }
    }

    /// Stages layered on top of the common pipeline for `platform`.
    #[must_use]
    pub fn stages(&self, platform: Platform) -> &[Box<dyn Stage>] {
        self.adapters
            .get(&platform)
            .map(PlatformAdapter::stages)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<&PlatformAdapter> {
        self.adapters.get(&platform)
    }
}

impl Default for AdapterTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_generic_targets_have_no_stages() {
        let table = AdapterTable::new();
        assert!(table.stages(Platform::Html).is_empty());
        assert!(table.stages(Platform::Juejin).is_empty());
    }

    #[test]
    fn test_wechat_stage_order() {
        let table = AdapterTable::new();
        let names = table.get(Platform::Wechat).unwrap().stage_names();
        assert_eq!(
            names,
            vec![
                "task-list-glyphs",
                "nested-list-unwrap",
                "code-whitespace",
                "stripped-footnote-links"
            ]
        );
    }

    #[test]
    fn test_zhihu_converts_task_lists() {
        let table = AdapterTable::new();
        assert_eq!(table.get(Platform::Zhihu).unwrap().stage_names(), vec!["task-list-glyphs"]);
    }

    #[test]
    fn test_table_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<AdapterTable>();
    }
}
