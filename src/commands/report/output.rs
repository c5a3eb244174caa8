use std::io::Write;

use anyhow::Result;

use crate::util::preview_chars;

use super::{NOTE_PREVIEW_CHARS, Report};

const RULE_WIDTH: usize = 70;

pub(super) fn render_text<W: Write>(output: &mut W, report: &Report) -> Result<()> {
    let heavy_rule = "=".repeat(RULE_WIDTH);
    let rule = "-".repeat(RULE_WIDTH);

    writeln!(output, "{heavy_rule}")?;
    writeln!(output, "DATABASE STATISTICS")?;
    writeln!(output, "{heavy_rule}")?;

    writeln!(output, "\nRECORD COUNTS:")?;
    writeln!(output, "{rule}")?;
    let counts = &report.table_counts;
    writeln!(output, "Patients:         {:>6} records", counts.patients)?;
    writeln!(output, "Studies:          {:>6} records", counts.studies)?;
    writeln!(output, "Series:           {:>6} records", counts.series)?;
    writeln!(output, "Images:           {:>6} records", counts.images)?;
    writeln!(output, "RadiologistsData: {:>6} records", counts.radiologists_data)?;

    writeln!(output, "\nDATA INTEGRITY CHECKS:")?;
    writeln!(output, "{rule}")?;
    writeln!(output, "Patients without notes: {}", report.patients_without_notes)?;
    writeln!(
        output,
        "Patients without MRI studies: {}",
        report.patients_without_studies
    )?;

    writeln!(output, "\nSERIES ORIENTATION DISTRIBUTION:")?;
    writeln!(output, "{rule}")?;
    for entry in &report.orientation_distribution {
        writeln!(output, "{:<15}: {:>5} series", entry.orientation, entry.count)?;
    }

    let sample = &report.sample;
    writeln!(output, "\nSAMPLE DATA - Patient {}:", sample.patient_id)?;
    writeln!(output, "{rule}")?;
    if sample.found {
        writeln!(output, "Patient ID: {}", sample.patient_id)?;
        if sample.notes.is_empty() {
            writeln!(output, "Radiologist Note: No note")?;
        }
        for note in &sample.notes {
            match note {
                Some(text) => writeln!(
                    output,
                    "Radiologist Note: {}",
                    preview_chars(text, NOTE_PREVIEW_CHARS)
                )?,
                None => writeln!(output, "Radiologist Note: No note")?,
            }
        }
    } else {
        writeln!(output, "Patient {} not found", sample.patient_id)?;
    }

    writeln!(output, "\nStudies:")?;
    for study in &sample.studies {
        let date = study
            .date
            .map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "no date".to_string());
        writeln!(output, "  - {} ({date})", study.name)?;
    }

    writeln!(output, "\nSeries:")?;
    for series in &sample.series {
        writeln!(
            output,
            "  - {:<40} | {:<12} | {} files",
            series.name, series.orientation, series.file_count
        )?;
    }

    writeln!(output, "\nTOP {} PATIENTS WITH MOST IMAGES:", report.top_patients.len())?;
    writeln!(output, "{rule}")?;
    writeln!(
        output,
        "{:<12} {:<10} {:<10} {:<10}",
        "Patient ID", "Studies", "Series", "Images"
    )?;
    writeln!(output, "{rule}")?;
    for rank in &report.top_patients {
        writeln!(
            output,
            "{:<12} {:<10} {:<10} {:<10}",
            rank.patient_id, rank.studies, rank.series, rank.images
        )?;
    }

    writeln!(output, "\nNOTES STATUS:")?;
    writeln!(output, "{rule}")?;
    writeln!(output, "Total records: {}", report.note_status.total)?;
    writeln!(output, "With notes:    {}", report.note_status.with_note)?;
    writeln!(output, "NULL notes:    {}", report.note_status.null_note)?;

    writeln!(output, "\n{heavy_rule}")?;
    writeln!(output, "DATA CHECK COMPLETED!")?;
    writeln!(output, "{heavy_rule}")?;

    Ok(())
}
