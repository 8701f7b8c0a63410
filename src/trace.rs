use std::collections::VecDeque;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TraceCategory {
    Event,
    Network,
    Cascade,
}

impl TraceCategory {
    fn prefix(self) -> &'static str {
        match self {
            Self::Event => "[event]",
            Self::Network => "[fetch]",
            Self::Cascade => "[cascade]",
        }
    }
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) events: bool,
    pub(crate) network: bool,
    pub(crate) to_stderr: bool,
    pub(crate) log_limit: usize,
    pub(crate) logs: VecDeque<String>,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            network: true,
            to_stderr: true,
            log_limit: 10_000,
            logs: VecDeque::new(),
        }
    }
}

impl TraceState {
    pub(crate) fn line(&mut self, category: TraceCategory, message: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let category_on = match category {
            TraceCategory::Event => self.events,
            TraceCategory::Network => self.network,
            TraceCategory::Cascade => true,
        };
        if !category_on {
            return;
        }

        let line = format!("{} {}", category.prefix(), message.as_ref());
        if self.to_stderr {
            eprintln!("{line}");
        }
        if self.logs.len() >= self.log_limit {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    pub(crate) fn set_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::InvalidConfig(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.log_limit = max_entries;
        while self.logs.len() > self.log_limit {
            self.logs.pop_front();
        }
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs).into_iter().collect()
    }
}
