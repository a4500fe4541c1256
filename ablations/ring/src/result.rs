//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        f.map_or_else(|| "/".to_string(), |f| format!("{f:.4}"))
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Converged by RMS: {}", p.get_converged())?;
    writeln!(w, "{S4}Stopped by iteration cap: {}", p.get_capped())?;
    writeln!(w, "{S4}Numerical breakdowns: {}", p.get_failed())?;
    writeln!(
        w,
        "{S4}Average iterations: {}",
        f64_to_display(p.get_avg_iterations())
    )?;
    writeln!(
        w,
        "{S4}Average redistances: {}",
        f64_to_display(p.get_avg_redistances())
    )?;
    writeln!(
        w,
        "{S4}Average relative area error: {}",
        f64_to_display(p.get_avg_area_error())
    )?;
    writeln!(w, "{S4}Segmentation time: {} us", p.get_task_time_us())?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p
        .get_most_time_consuming()
        .map_or_else(|| "/".to_string(), |d| d.as_micros().to_string());
    write!(w, "{S4}Most time-consuming task costs {t} us")?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl FromIterator<(&'static str, Profile)> for AblationResult {
    fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }
}

impl AblationResult {
    /// 打印运行结果.
    pub fn analyze(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = self.write_to(&mut out) {
            log::error!("failed to write ablation result: {e}");
        }
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        utils::sep_to(&mut *w)?;
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, w)?;
            writeln!(w)?;
            utils::sep_to(&mut *w)?;
        }
        Ok(())
    }
}
