//! System information report.
//!
//! Function-shaped: exposes free `describe` and `execute` functions and is
//! registered through `fn_tool!`. Facts come from the standard library and,
//! on Linux, from `/proc`.

use serde_json::{json, Value};
use std::fmt::Write;
use toolhost_core::{ArgumentMap, ParamSpec, ParamType, ToolDescriptor, ToolError, ToolOutput, ToolResult};

const CATEGORIES: &[&str] = &["system", "cpu", "memory", "disk", "network"];
const UNAVAILABLE: &str = "unavailable on this platform";
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

pub fn describe() -> ToolDescriptor {
    ToolDescriptor::new(
        "system_info",
        "Report system information: OS, CPU, memory, disks and network interfaces",
    )
    .param(ParamSpec::optional(
        "info_type",
        ParamType::String,
        "all",
        "Category: all, system, cpu, memory, disk or network",
    ))
    .param(ParamSpec::optional("format", ParamType::String, "text", "Output format: text or json"))
}

pub fn execute(args: ArgumentMap) -> ToolResult<ToolOutput> {
    let args = args.conform(&describe().parameters)?;
    let info_type = args.get_str("info_type").unwrap_or("all").to_ascii_lowercase();
    let format = args.get_str("format").unwrap_or("text").to_ascii_lowercase();

    let selected: Vec<&str> = match info_type.as_str() {
        "all" => CATEGORIES.to_vec(),
        one if CATEGORIES.contains(&one) => vec![one],
        other => {
            return Err(ToolError::validation(
                "info_type",
                format!("expected one of all, {}, got {}", CATEGORIES.join(", "), other),
            ))
        }
    };
    if format != "text" && format != "json" {
        return Err(ToolError::validation(
            "format",
            format!("expected text or json, got {}", format),
        ));
    }

    let sections: Vec<(&str, Value)> = selected
        .into_iter()
        .map(|category| (category, collect(category)))
        .collect();

    if format == "json" {
        let map: serde_json::Map<String, Value> = sections
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Ok(ToolOutput::Json(Value::Object(map)))
    } else {
        Ok(ToolOutput::text(render_text(&sections)))
    }
}

fn collect(category: &str) -> Value {
    match category {
        "system" => system_section(),
        "cpu" => cpu_section(),
        "memory" => read_proc("/proc/meminfo").map_or_else(unavailable, |t| memory_section(&t)),
        "disk" => read_proc("/proc/mounts").map_or_else(unavailable, |t| disk_section(&t)),
        "network" => network_section(),
        _ => unavailable(),
    }
}

fn unavailable() -> Value {
    Value::String(UNAVAILABLE.to_string())
}

fn read_proc(path: &str) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

fn hostname() -> String {
    read_proc("/proc/sys/kernel/hostname")
        .map(|h| h.trim().to_string())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn system_section() -> Value {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let kernel = read_proc("/proc/sys/kernel/osrelease")
        .map(|r| r.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    json!({
        "os": std::env::consts::OS,
        "family": std::env::consts::FAMILY,
        "kernel": kernel,
        "arch": std::env::consts::ARCH,
        "hostname": hostname(),
        "user": user,
        "time": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

fn cpu_section() -> Value {
    let logical = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut section = json!({ "logical_cores": logical });

    if let Some(cpuinfo) = read_proc("/proc/cpuinfo") {
        let field = |key: &str| {
            cpuinfo
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(k, _)| k.trim() == key)
                .map(|(_, v)| v.trim().to_string())
        };
        if let Some(model) = field("model name") {
            section["model"] = json!(model);
        }
        if let Some(mhz) = field("cpu MHz") {
            section["frequency_mhz"] = json!(mhz);
        }
    }
    if let Some(load) = read_proc("/proc/loadavg") {
        let averages: Vec<&str> = load.split_whitespace().take(3).collect();
        section["load_average"] = json!(averages.join(" "));
    }
    section
}

/// Values from `/proc/meminfo`, in kB
fn meminfo_field(text: &str, key: &str) -> Option<u64> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.split_whitespace().next())
        .and_then(|v| v.parse().ok())
}

fn memory_section(meminfo: &str) -> Value {
    let gib = |kb: u64| format!("{:.2}", kb as f64 * 1024.0 / GIB);
    let percent = |part: u64, whole: u64| {
        if whole == 0 {
            "0.0".to_string()
        } else {
            format!("{:.1}", part as f64 * 100.0 / whole as f64)
        }
    };

    let total = meminfo_field(meminfo, "MemTotal").unwrap_or(0);
    let available = meminfo_field(meminfo, "MemAvailable")
        .or_else(|| meminfo_field(meminfo, "MemFree"))
        .unwrap_or(0);
    let used = total.saturating_sub(available);
    let swap_total = meminfo_field(meminfo, "SwapTotal").unwrap_or(0);
    let swap_used = swap_total.saturating_sub(meminfo_field(meminfo, "SwapFree").unwrap_or(0));

    json!({
        "total_gb": gib(total),
        "available_gb": gib(available),
        "used_gb": gib(used),
        "used_percent": percent(used, total),
        "swap_total_gb": gib(swap_total),
        "swap_used_percent": percent(swap_used, swap_total),
    })
}

/// Block-device mounts from `/proc/mounts`
fn disk_section(mounts: &str) -> Value {
    let disks: serde_json::Map<String, Value> = mounts
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            device.starts_with("/dev/").then(|| {
                (
                    mount_point.to_string(),
                    json!({ "device": device, "filesystem": fs_type }),
                )
            })
        })
        .collect();
    Value::Object(disks)
}

/// Per-interface counters from `/proc/net/dev`
fn interface_section(net_dev: &str) -> serde_json::Map<String, Value> {
    net_dev
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (name, counters) = line.split_once(':')?;
            let counters: Vec<u64> = counters
                .split_whitespace()
                .filter_map(|c| c.parse().ok())
                .collect();
            if counters.len() < 10 {
                return None;
            }
            Some((
                name.trim().to_string(),
                json!({
                    "received_mb": format!("{:.2}", counters[0] as f64 / MIB),
                    "received_packets": counters[1],
                    "sent_mb": format!("{:.2}", counters[8] as f64 / MIB),
                    "sent_packets": counters[9],
                }),
            ))
        })
        .collect()
}

fn network_section() -> Value {
    let mut section = match read_proc("/proc/net/dev") {
        Some(text) => interface_section(&text),
        None => serde_json::Map::new(),
    };
    section.insert("hostname".to_string(), json!(hostname()));
    Value::Object(section)
}

fn render_text(sections: &[(&str, Value)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "System Information");
    let _ = write!(out, "{}", "=".repeat(50));

    for (name, value) in sections {
        let _ = write!(out, "\n\n[{}]", name);
        match value {
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::Object(inner) => {
                            let _ = write!(out, "\n  {}:", key);
                            for (k, v) in inner {
                                let _ = write!(out, "\n    {}: {}", k, scalar(v));
                            }
                        }
                        other => {
                            let _ = write!(out, "\n  {}: {}", key, scalar(other));
                        }
                    }
                }
            }
            other => {
                let _ = write!(out, "\n  {}", scalar(other));
            }
        }
    }
    out
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
