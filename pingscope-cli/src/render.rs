use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Output {
	Table,
	Json,
}

/// Column-ordered result of a command, printable as a table or JSON array.
#[derive(Debug, Default)]
pub struct Rows {
	headers: Vec<&'static str>,
	rows: Vec<Vec<Value>>,
}

impl Rows {
	pub fn new(headers: Vec<&'static str>) -> Self { Self { headers, rows: Vec::new() } }

	pub fn push(&mut self, row: Vec<Value>) {
		debug_assert_eq!(row.len(), self.headers.len());
		self.rows.push(row);
	}

	pub fn len(&self) -> usize { self.rows.len() }

	pub fn to_json(&self) -> Value {
		Value::Array(
			self.rows
				.iter()
				.map(|r| {
					let obj: Map<String, Value> = self.headers.iter().map(|h| h.to_string()).zip(r.iter().cloned()).collect();
					Value::Object(obj)
				})
				.collect(),
		)
	}

	pub fn to_table(&self) -> Table {
		let mut table = Table::new();
		table.load_preset(UTF8_FULL).set_header(self.headers.clone());
		for r in &self.rows {
			table.add_row(r.iter().map(cell).collect::<Vec<_>>());
		}
		table
	}

	pub fn render(&self, output: Output) -> anyhow::Result<String> {
		Ok(match output {
			Output::Table => self.to_table().to_string(),
			Output::Json => serde_json::to_string_pretty(&self.to_json())?,
		})
	}
}

fn cell(v: &Value) -> String {
	match v {
		Value::Null => "-".into(),
		Value::String(s) => s.clone(),
		Value::Number(n) => match n.as_f64() {
			Some(f) if n.is_f64() => format!("{f:.3}"),
			_ => n.to_string(),
		},
		other => other.to_string(),
	}
}

/// JSON number, or null for no data / non-finite values (JSON has no infinity).
pub fn num(v: Option<f64>) -> Value {
	v.and_then(serde_json::Number::from_f64).map_or(Value::Null, Value::Number)
}
