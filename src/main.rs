use log::debug;

use orcfile::cli::{Cli, OutputFormat};
use orcfile::io::ByteRangeProvider;
use orcfile::stats::describe;
use orcfile::{OrcReader, Table, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse_args();

    if !cli.path.is_file() {
        return Err(format!("Path does not exist: {}", cli.path.display()).into());
    }
    let reader = OrcReader::open_path(&cli.path)?;

    if cli.meta {
        print_metadata(&reader);
        return Ok(());
    }

    let mut table = reader.read_table(cli.columns.as_deref())?;
    if let Some(limit) = cli.limit {
        table.rows.truncate(limit);
    }
    debug!("printing {} rows of {}", table.row_count(), cli.path.display());

    match cli.format {
        OutputFormat::Table => print_table(&table),
        OutputFormat::Csv => print_csv(&table),
        OutputFormat::Json => print_json(&table),
    }

    Ok(())
}

fn print_metadata<P: ByteRangeProvider>(reader: &OrcReader<P>) {
    println!("File version: {}", reader.file_version());
    if let Some(version) = reader.writer_version() {
        println!("Writer version: {}", version);
    }
    println!("File length: {}", reader.file_length());
    println!("Rows: {}", reader.number_of_rows());
    println!(
        "Compression: {} (block size {})",
        reader.compression(),
        reader.compression_block_size()
    );
    println!("Row index stride: {}", reader.row_index_stride());
    println!("Schema: {}", reader.schema());

    println!();
    println!("Stripes:");
    for (i, stripe) in reader.stripes().iter().enumerate() {
        println!(
            "  #{}: offset={} rows={} index={} data={} footer={}",
            i,
            stripe.offset,
            stripe.number_of_rows,
            stripe.index_length,
            stripe.data_length,
            stripe.footer_length
        );
    }

    println!();
    println!("Column statistics:");
    for (id, stats) in reader.statistics().iter().enumerate() {
        let name = match id {
            0 => "<root>",
            _ => reader
                .schema()
                .columns
                .get(id - 1)
                .map(|c| c.name.as_str())
                .unwrap_or("?"),
        };
        println!("  {}: {}", name, describe(stats));
    }

    if !reader.user_metadata().is_empty() {
        println!();
        println!("User metadata:");
        for item in reader.user_metadata() {
            println!("  {}: {}", item.name, String::from_utf8_lossy(&item.value));
        }
    }
}

fn print_table(table: &Table) {
    if table.row_count() == 0 {
        println!("(0 rows)");
        return;
    }

    // Calculate column widths
    let widths: Vec<usize> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let header_width = col.name.len();
            let max_value_width = table
                .rows
                .iter()
                .map(|row| row.values.get(i).map(|v| v.to_string().len()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            header_width.max(max_value_width)
        })
        .collect();

    let header: Vec<String> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{:width$}", col.name, width = widths[i]))
        .collect();
    println!("{}", header.join(" | "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("-+-"));

    for row in &table.rows {
        let values: Vec<String> = row
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:width$}", v.to_string(), width = widths[i]))
            .collect();
        println!("{}", values.join(" | "));
    }

    println!("({} rows)", table.row_count());
}

fn print_csv(table: &Table) {
    let header: Vec<&str> = table.schema.columns.iter().map(|c| c.name.as_str()).collect();
    println!("{}", header.join(","));

    for row in &table.rows {
        let values: Vec<String> = row
            .values
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                _ => {
                    let s = v.to_string();
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s
                    }
                }
            })
            .collect();
        println!("{}", values.join(","));
    }
}

fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn print_json(table: &Table) {
    print!("[");
    for (i, row) in table.rows.iter().enumerate() {
        if i > 0 {
            print!(",");
        }
        print!("{{");
        for (j, (col, val)) in table.schema.columns.iter().zip(row.values.iter()).enumerate() {
            if j > 0 {
                print!(",");
            }
            let val_str = match val {
                Value::Null => "null".to_string(),
                Value::Boolean(b) => b.to_string(),
                Value::Integer(n) => n.to_string(),
                Value::Float(f) if f.is_finite() => f.to_string(),
                Value::Float(_) => "null".to_string(),
                Value::Decimal(d) => d.to_string(),
                _ => json_string(&val.to_string()),
            };
            print!("{}:{}", json_string(&col.name), val_str);
        }
        print!("}}");
    }
    println!("]");
}
