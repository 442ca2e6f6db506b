//! Visualization functions using Plotters for cluster analysis

use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::data::CustomerRecord;
use crate::labels::{ClusterProfile, IncomeTier, LabelTable};

/// Colour per income tier
fn tier_color(tier: Option<IncomeTier>) -> RGBColor {
    match tier {
        Some(IncomeTier::Low) => RED,
        Some(IncomeTier::Middle) => BLUE,
        Some(IncomeTier::High) => GREEN,
        None => BLACK,
    }
}

/// Scatter plot of amount spent against tenure, coloured by income tier
///
/// # Arguments
/// * `records` - Training records (raw, not standardized)
/// * `assignments` - Partition index per record
/// * `labels` - Label table naming each partition
/// * `output_path` - Path to save the PNG plot
pub fn create_cluster_visualization(
    records: &[CustomerRecord],
    assignments: &[usize],
    labels: &LabelTable,
    output_path: &Path,
) -> crate::Result<()> {
    if records.len() != assignments.len() {
        anyhow::bail!(
            "Got {} records but {} cluster assignments",
            records.len(),
            assignments.len()
        );
    }
    if records.is_empty() {
        anyhow::bail!("Nothing to plot");
    }

    let (spend_min, spend_max) = bounds(records.iter().map(|r| r.amount_spent));
    let (tenure_min, tenure_max) = bounds(records.iter().map(|r| r.tenure));
    let spend_pad = (spend_max - spend_min).max(1.0) * 0.05;
    let tenure_pad = (tenure_max - tenure_min).max(1.0) * 0.05;

    let root = BitMapBackend::new(output_path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Segmentation (K-Means)", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            (spend_min - spend_pad)..(spend_max + spend_pad),
            (tenure_min - tenure_pad)..(tenure_max + tenure_pad),
        )?;

    chart
        .configure_mesh()
        .x_desc("Amount Spent")
        .y_desc("Tenure (Years)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    // One series per partition so each gets a legend entry
    for (cluster, tier) in labels.iter() {
        let color = tier_color(Some(tier));
        let points = records
            .iter()
            .zip(assignments)
            .filter(|(_, &assigned)| assigned == cluster)
            .map(|(record, _)| Circle::new((record.amount_spent, record.tenure), 3, color.filled()));

        chart
            .draw_series(points)?
            .label(tier.as_str())
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "cluster visualization saved");

    Ok(())
}

/// Bar chart of partition sizes, coloured by tier
pub fn create_cluster_size_chart(
    profiles: &[ClusterProfile],
    labels: &LabelTable,
    output_path: &Path,
) -> crate::Result<()> {
    let max_size = profiles.iter().map(|p| p.size).max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(profiles.len() as f64 - 0.5), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster ID")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for profile in profiles {
        let color = tier_color(labels.get(profile.cluster));
        let x = profile.cluster as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.4, 0.0), (x + 0.4, profile.size as f64)],
            color.filled(),
        )))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "cluster size chart saved");

    Ok(())
}

/// Print cluster statistics to console
pub fn print_cluster_statistics(profiles: &[ClusterProfile], labels: &LabelTable, inertia: f64) {
    let total: usize = profiles.iter().map(|p| p.size).sum();

    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", profiles.len());
    println!("Total customers: {}", total);
    println!("Within-cluster sum of squares (Inertia): {:.2}", inertia);

    println!("\nCluster means:");
    println!("  Cluster | Size  | Share  | Amount Spent | Tenure | Label");
    println!("  --------|-------|--------|--------------|--------|--------------");
    for profile in profiles {
        let share = if total == 0 {
            0.0
        } else {
            profile.size as f64 / total as f64 * 100.0
        };
        let label = labels
            .get(profile.cluster)
            .map(|tier| tier.as_str())
            .unwrap_or("-");
        println!(
            "  {:7} | {:5} | {:5.1}% | {:12.2} | {:6.2} | {}",
            profile.cluster, profile.size, share, profile.mean_amount_spent, profile.mean_tenure, label
        );
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
