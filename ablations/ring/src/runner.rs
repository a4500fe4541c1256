//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use gac_berry::prelude::*;
use std::path::Path;
use std::thread;
use utils::loader::{self, RingCase};

/// 参与比较的圆环半径.
const RADII: [f64; 4] = [12.0, 16.0, 20.0, 24.0];

/// 参与比较的演化配置: 名称与 (传播, 曲率, 平流) 权重.
const VARIANTS: [(&str, [f64; 3]); 4] = [
    ("propagation", [1.0, 0.0, 0.0]),
    ("no-advection", [1.0, 1.0, 0.0]),
    ("balanced", [1.0, 1.0, 1.0]),
    ("strong-curvature", [1.0, 3.0, 1.0]),
];

/// 在全部圆环上运行一组配置.
fn ablate(name: &str, config: &EvolutionConfig, cases: &[RingCase], out: &Path) -> Profile {
    let threshold = BinaryThreshold::default();
    let mut profile = Profile::new();
    for case in cases {
        profile.task_start();
        let seg = segment_image(
            &case.image,
            &loader::inverted_potential,
            &case.seeds,
            config,
            &threshold,
        );
        profile.task_elapsed();

        match seg {
            Ok(seg) => {
                let disc = std::f64::consts::PI * case.radius * case.radius;
                let area = seg.mask.foreground_count() as f64;
                profile.count_report(&seg.report, (area - disc).abs() / disc);

                let path = out.join(format!("{name}_r{}.png", case.radius));
                if let Err(e) = seg.mask.save(&path) {
                    log::warn!("cannot save {}: {e}", path.display());
                }
                let path = out.join(format!("{name}_r{}_level_set.png", case.radius));
                if let Err(e) = seg.level_set.save_rescaled(&path) {
                    log::warn!("cannot save {}: {e}", path.display());
                }
            }
            Err(e) => {
                log::warn!("`{name}` on radius {} failed: {e}", case.radius);
                profile.count_failed();
            }
        }
    }
    profile.finish()
}

/// 实际运行.
pub fn run() -> AblationResult {
    let out = loader::output_dir_from_env_or_temp();
    std::fs::create_dir_all(&out).expect("Cannot create output directory");

    let cases: Vec<RingCase> = RADII
        .iter()
        .map(|&r| loader::ring_case(r).expect("Building ring phantom error"))
        .collect();
    let base = EvolutionConfig::default();

    println!(
        "Running ablation studies on {} cores, masks go to {}...",
        utils::cpus(),
        out.display()
    );
    thread::scope(|s| {
        let (cases, out) = (&cases, out.as_path());
        let handles = VARIANTS.map(|(name, [beta, gamma, alpha])| {
            let config = EvolutionConfig::new(
                beta,
                gamma,
                alpha,
                base.maximum_iterations(),
                base.maximum_rms_error(),
            )
            .expect("Invalid evolution config");
            s.spawn(move || ablate(name, &config, cases, out))
        });

        VARIANTS
            .map(|(name, _)| name)
            .into_iter()
            .zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            )
            .collect()
    })
}
