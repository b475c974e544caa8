//! Common utility functions shared across CLI commands.

use chrono::{DateTime, Utc};
use colored::Colorize;
use leafid_core::Identification;

/// Format a record timestamp as a human-readable UTC string.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `95` → `95%`, `87.5` → `87.5%`.
pub fn format_confidence(confidence: f64) -> String {
    if confidence.fract() == 0.0 {
        format!("{confidence:.0}%")
    } else {
        format!("{confidence:.1}%")
    }
}

/// Inline data URIs are too long to print; describe them instead.
pub fn describe_image_url(url: &str) -> String {
    match url.strip_prefix("data:") {
        Some(rest) => {
            let mime = rest.split([';', ',']).next().unwrap_or("");
            let payload = rest.split_once(',').map_or(0, |(_, p)| p.len());
            // base64 carries 3 bytes per 4 characters
            let kb = (payload * 3 / 4).div_ceil(1024);
            if mime.is_empty() {
                format!("inline image ({kb} KB)")
            } else {
                format!("inline {mime} ({kb} KB)")
            }
        }
        None => url.to_string(),
    }
}

/// Print the full view of one record.
pub fn print_record(record: &Identification) {
    println!("   {} {}", "Plant:".dimmed(), record.plant_name.bold());
    println!("   {} {}", "Scientific name:".dimmed(), record.scientific_name.italic());
    println!(
        "   {} {}",
        "Confidence:".dimmed(),
        format_confidence(record.confidence)
    );
    if let Some(description) = &record.description {
        println!("   {} {}", "Description:".dimmed(), description);
    }
    let tips = record.care_tips();
    if !tips.is_empty() {
        println!("   {}", "Care tips:".dimmed());
        for tip in tips {
            println!("     - {tip}");
        }
    }
    println!("   {} {}", "Image:".dimmed(), describe_image_url(&record.image_url));
    println!("   {} {}", "Identified:".dimmed(), format_timestamp(record.timestamp));
    println!("   {} {}", "ID:".dimmed(), record.id);
}
