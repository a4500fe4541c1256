//! 合成圆环上的消融实验: 比较不同演化项组合的收敛情况与耗时.
//!
//! 掩膜输出到 `$GAC_ABLATION_OUT` (或系统临时目录).

mod profile;
mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .ok();
    runner::run().analyze();
}
