#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 單一階段 (extract / transform / load) 的耗時與記憶體快照
#[derive(Debug, Clone)]
pub struct StageStats {
    pub stage: String,
    pub stage_elapsed: Duration,
    pub total_elapsed: Duration,
    pub memory_usage_mb: Option<u64>,
}

pub struct StageMonitor {
    #[cfg(feature = "cli")]
    system: Mutex<System>,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    start_time: Instant,
    last_mark: Mutex<Instant>,
    peak_memory_mb: Mutex<u64>,
    history: Mutex<Vec<StageStats>>,
    enabled: bool,
}

impl StageMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            #[cfg(feature = "cli")]
            system: Mutex::new(if enabled {
                System::new_with_specifics(RefreshKind::everything())
            } else {
                System::new()
            }),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
            start_time: now,
            last_mark: Mutex::new(now),
            peak_memory_mb: Mutex::new(0),
            history: Mutex::new(Vec::new()),
            enabled,
        }
    }

    #[cfg(feature = "cli")]
    fn sample_memory_mb(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_all();
        let process = system.process(pid)?;
        Some(process.memory() / 1024 / 1024)
    }

    #[cfg(not(feature = "cli"))]
    fn sample_memory_mb(&self) -> Option<u64> {
        None
    }

    /// 記錄一個階段結束；停用時不做任何事
    pub fn mark(&self, stage: &str) -> Option<StageStats> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let stage_elapsed = {
            let mut last = self.last_mark.lock().ok()?;
            let elapsed = now.duration_since(*last);
            *last = now;
            elapsed
        };

        let memory_usage_mb = self.sample_memory_mb();
        if let Some(mb) = memory_usage_mb {
            let mut peak = self.peak_memory_mb.lock().ok()?;
            if mb > *peak {
                *peak = mb;
            }
        }

        let stats = StageStats {
            stage: stage.to_string(),
            stage_elapsed,
            total_elapsed: now.duration_since(self.start_time),
            memory_usage_mb,
        };

        tracing::info!(
            "📊 {} - stage: {:?}, total: {:?}, memory: {}",
            stats.stage,
            stats.stage_elapsed,
            stats.total_elapsed,
            stats
                .memory_usage_mb
                .map(|mb| format!("{}MB", mb))
                .unwrap_or_else(|| "n/a".to_string())
        );

        if let Ok(mut history) = self.history.lock() {
            history.push(stats.clone());
        }
        Some(stats)
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let peak = self.peak_memory_mb.lock().map(|p| *p).unwrap_or(0);
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.start_time.elapsed(),
            peak
        );
    }

    pub fn history(&self) -> Vec<StageStats> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl Default for StageMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
