//! 演化运行统计.

use gac_berry::level_set::{EvolutionReport, Status};
use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 支持多段累计: `start` 与 `elapsed` 交替调用.
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器, 视为已经开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 累加并返回本段时长.
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    #[inline]
    fn total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 一组演化配置在全部任务上的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 以 RMS 收敛的任务数.
    converged: u64,

    /// 达到迭代上限的任务数.
    capped: u64,

    /// 数值失效的任务数.
    failed: u64,

    /// 全部成功任务的迭代次数之和.
    iterations: u64,

    /// 全部成功任务的重新距离化次数之和.
    redistances: u64,

    /// 成功任务的掩膜面积相对误差之和.
    area_error: f64,

    /// 单次分割 (含势场构建) 的计时.
    task_time: AccTimer,

    /// 整个线程的计时.
    real_time: AccTimer,

    /// 最耗时的一次任务.
    most: Option<Duration>,
}

impl Profile {
    #[inline]
    pub fn new() -> Self {
        Self {
            converged: 0,
            capped: 0,
            failed: 0,
            iterations: 0,
            redistances: 0,
            area_error: 0.0,
            task_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
        }
    }

    /// 开始一次任务计时.
    #[inline]
    pub fn task_start(&mut self) {
        self.task_time.start();
    }

    /// 结束一次任务计时.
    #[inline]
    pub fn task_elapsed(&mut self) {
        let d = self.task_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录一次成功的分割, `area_error` 为掩膜面积的相对误差.
    pub fn count_report(&mut self, report: &EvolutionReport, area_error: f64) {
        match report.status {
            Status::ConvergedByRms => self.converged += 1,
            Status::StoppedByIterationCap => self.capped += 1,
            // 无观察者时不会以 `Running` 结束.
            Status::Running | Status::Failed => self.failed += 1,
        }
        self.iterations += u64::from(report.elapsed_iterations);
        self.redistances += u64::from(report.redistances);
        self.area_error += area_error;
    }

    /// 记录一次数值失效.
    #[inline]
    pub fn count_failed(&mut self) {
        self.failed += 1;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    #[inline]
    fn succeeded(&self) -> u64 {
        self.converged + self.capped
    }

    #[inline]
    pub fn get_converged(&self) -> u64 {
        self.converged
    }

    #[inline]
    pub fn get_capped(&self) -> u64 {
        self.capped
    }

    #[inline]
    pub fn get_failed(&self) -> u64 {
        self.failed
    }

    /// 成功任务的平均迭代次数.
    pub fn get_avg_iterations(&self) -> Option<f64> {
        match self.succeeded() {
            0 => None,
            n => Some(self.iterations as f64 / n as f64),
        }
    }

    /// 成功任务的平均重新距离化次数.
    pub fn get_avg_redistances(&self) -> Option<f64> {
        match self.succeeded() {
            0 => None,
            n => Some(self.redistances as f64 / n as f64),
        }
    }

    /// 成功任务的平均面积相对误差.
    pub fn get_avg_area_error(&self) -> Option<f64> {
        match self.succeeded() {
            0 => None,
            n => Some(self.area_error / n as f64),
        }
    }

    /// 以微秒为单位获得任务的总花费时间.
    #[inline]
    pub fn get_task_time_us(&self) -> u64 {
        self.task_time.total_us()
    }

    /// 以微秒为单位获得线程的总运行时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.total_us()
    }

    /// 最耗时的一次任务. 不存在任务时返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
