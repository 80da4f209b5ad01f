use super::Context;

use anyhow::{Context as _, Result};
use subbrain_core::api::{HardwareProfile, LanguageProfile};
use subbrain_core::hardware::{fetch_hardware, fetch_platform, fetch_recommendations};
use subbrain_core::languages::{fetch_language, fetch_languages};
use subbrain_core::scan::{ScanKind, trigger_scan};

pub async fn hardware(ctx: &Context) -> Result<()> {
    let profile = fetch_hardware(&ctx.client)
        .await
        .context("Hardware detection failed")?;
    print!("{}", format_hardware(&profile));
    Ok(())
}

pub async fn recommendations(ctx: &Context) -> Result<()> {
    let recs = fetch_recommendations(&ctx.client)
        .await
        .context("Failed to fetch recommendations")?;
    if recs.is_empty() {
        println!("No recommendations.");
    }
    for rec in recs {
        println!("[{}] {}", rec.kind, rec.title);
        println!("    {}", rec.description);
        if let Some(action) = rec.action {
            println!("    -> {}", action);
        }
    }
    Ok(())
}

pub async fn platform(ctx: &Context) -> Result<()> {
    let info = fetch_platform(&ctx.client)
        .await
        .context("Platform detection failed")?;
    println!("Platform:  {} ({})", info.platform, info.os);
    Ok(())
}

pub async fn languages(ctx: &Context, code: Option<&str>) -> Result<()> {
    match code {
        Some(code) => {
            let profile = fetch_language(&ctx.client, code)
                .await
                .with_context(|| format!("Failed to fetch the profile for {:?}", code))?;
            print!("{}", format_language(&profile));
        }
        None => {
            let profiles = fetch_languages(&ctx.client)
                .await
                .context("Failed to fetch language profiles")?;
            if profiles.is_empty() {
                println!("No language profiles.");
            }
            for profile in &profiles {
                println!(
                    "{:<6} {:<24} {:>6} file(s){}",
                    profile.code,
                    profile.display_name(),
                    profile.files_processed,
                    if profile.is_optimized { "" } else { "  (defaults)" }
                );
            }
        }
    }
    Ok(())
}

pub async fn scan(ctx: &Context, kind: &str) -> Result<()> {
    let kind: ScanKind = kind.parse()?;
    let resp = trigger_scan(&ctx.client, &ctx.session, kind).await?;
    println!("{}", resp.message);
    if let Some(reason) = resp.reason {
        println!("Reason: {}", reason);
    }
    Ok(())
}

fn gb(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1} GB", v))
}

fn format_language(lang: &LanguageProfile) -> String {
    let mut out = format!("{} ({})\n", lang.display_name(), lang.code);
    out.push_str(&format!("Patience:        {}\n", lang.patience));
    out.push_str(&format!("Length penalty:  {}\n", lang.length_penalty));
    out.push_str(&format!("Beam size:       {}\n", lang.beam_size));
    out.push_str(&format!("Files processed: {}\n", lang.files_processed));
    if let Some(last) = &lang.last_used {
        out.push_str(&format!("Last used:       {}\n", last));
    }
    if !lang.is_optimized {
        out.push_str("No tuned profile; generic defaults apply.\n");
    }
    if let Some(rec) = &lang.recommendation {
        out.push_str(&format!("\n{}\n", rec));
    }
    out
}

fn format_hardware(hw: &HardwareProfile) -> String {
    let mut out = format!(
        "Device:    {} ({})\n",
        hw.device_name.as_deref().unwrap_or("unknown"),
        hw.device_type
    );
    if hw.has_gpu() {
        out.push_str(&format!(
            "VRAM:      {} total, {} free\n",
            gb(hw.total_memory),
            gb(hw.available_memory)
        ));
    }
    if let Some(threads) = hw.cpu_threads {
        let cores = hw.cpu_cores.map_or_else(String::new, |c| format!("{} cores, ", c));
        out.push_str(&format!("CPU:       {}{} threads\n", cores, threads));
    }
    out.push_str(&format!("RAM:       {} total, {} free\n", gb(hw.ram_total), gb(hw.ram_available)));
    match &hw.platform_version {
        Some(version) => out.push_str(&format!("Platform:  {}\n", version)),
        None => out.push_str(&format!("Platform:  {}\n", hw.platform)),
    }
    if let Some(storage) = &hw.storage {
        out.push_str(&format!(
            "Storage:   {:.0} GB free of {:.0} GB{}\n",
            storage.free,
            storage.total,
            storage.kind.as_deref().map(|k| format!(" ({})", k)).unwrap_or_default()
        ));
    }
    if let Some(rec) = &hw.recommendation {
        out.push_str(&format!("\n{}\n", rec));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_only_profile() {
        let hw: HardwareProfile = serde_json::from_value(serde_json::json!({
            "device_type": "cpu",
            "device_name": "AMD Ryzen 7",
            "cpu_cores": 8,
            "cpu_threads": 16,
            "ram_total": 31.3,
            "ram_available": 20.04,
            "platform": "Linux"
        }))
        .unwrap();
        let text = format_hardware(&hw);
        assert!(!text.contains("VRAM"));
        assert!(text.contains("CPU:       8 cores, 16 threads\n"));
        assert!(text.contains("RAM:       31.3 GB total, 20.0 GB free\n"));
        assert!(text.contains("Platform:  Linux\n"));
    }

    #[test]
    fn generic_language_profile_is_flagged() {
        let lang: LanguageProfile = serde_json::from_value(serde_json::json!({
            "code": "xx",
            "name": "XX",
            "flag": "🌐",
            "patience": 1.5,
            "length_penalty": 0.9,
            "recommendation": "Using default settings",
            "is_optimized": false
        }))
        .unwrap();
        let text = format_language(&lang);
        assert!(text.starts_with("🌐 XX (xx)\n"));
        assert!(text.contains("Beam size:       5\n"));
        assert!(text.contains("generic defaults apply"));
        assert!(!text.contains("Last used"));
    }
}
