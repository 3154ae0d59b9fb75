use std::io::Write;

use anyhow::{Context, Result};

use grade_lens::data::filter::Table;
use grade_lens::data::stats::SheetTable;
use grade_lens::data::StatisticsReport;

use crate::OutputFormat;

// ---------------------------------------------------------------------------
// Student table
// ---------------------------------------------------------------------------

/// Write the filtered table in the requested format.
pub fn write_table<W: Write>(out: &mut W, table: &Table, format: OutputFormat) -> Result<()> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.text.clone()).collect())
        .collect();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, table).context("writing JSON table")?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            write_csv(out, std::iter::once(&table.headers).chain(rows.iter()))?;
        }
        OutputFormat::Table => {
            write_aligned(out, std::iter::once(&table.headers).chain(rows.iter()))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Statistics sheets
// ---------------------------------------------------------------------------

/// Write every statistics sheet: pass-rate table, then mean table.
pub fn write_statistics<W: Write>(
    out: &mut W,
    report: &StatisticsReport,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, report).context("writing JSON statistics")?;
        writeln!(out)?;
        return Ok(());
    }

    for sheet in &report.sheets {
        let name = vec![sheet.name()];
        for table in [sheet.pass_rate_table(), sheet.mean_table()] {
            match format {
                OutputFormat::Csv => {
                    let title = vec![table.title.clone()];
                    let lines = std::iter::once(&name)
                        .chain(std::iter::once(&title))
                        .chain(sheet_lines(&table));
                    write_csv(out, lines)?;
                }
                _ => {
                    writeln!(out, "{}", name[0])?;
                    writeln!(out, "{}", table.title)?;
                    write_aligned(out, sheet_lines(&table))?;
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

fn sheet_lines(table: &SheetTable) -> impl Iterator<Item = &Vec<String>> {
    std::iter::once(&table.headers)
        .chain(table.rows.iter())
        .chain(std::iter::once(&table.summary))
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_csv<'a, W, I>(out: &mut W, lines: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = &'a Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(&mut *out);
    for line in lines {
        writer.write_record(line).context("writing CSV record")?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

/// Left-align every column to its widest cell.
fn write_aligned<'a, W, I>(out: &mut W, lines: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = &'a Vec<String>>,
{
    let lines: Vec<&Vec<String>> = lines.collect();
    let columns = lines.iter().map(|l| l.len()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            lines
                .iter()
                .filter_map(|l| l.get(col))
                .map(|text| text.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for line in lines {
        let text = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{}", text.trim_end())?;
    }
    Ok(())
}
