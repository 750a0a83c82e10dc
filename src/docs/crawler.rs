//! Crawls the SMHI parameter documentation page into [`ParameterMetadata`].
//!
//! The page is expected to look like this:
//! ```html
//! <div id="pmp3g-parameters">
//!   <table>
//!     <tr><th>Parameter</th><th>Level type</th><th>Level</th><th>Description</th><th>Unit</th><th>Value range</th></tr>
//!     <tr><td>t</td><td>hl</td><td>2</td><td>Air temperature</td><td>Cel</td><td>Decimal number, one decimal</td></tr>
//!     ...
//!   </table>
//! </div>
//! ```

use crate::clients::forecast_client::ForecastClient;
use crate::config::{PipelineConfig, RowPolicy};
use crate::docs::error::CrawlError;
use crate::prompt::Prompt;
use crate::store::artifacts::{ArtifactStore, CSV};
use crate::store::error::StoreError;
use crate::types::parameter::{normalize_name, ParameterMetadata};
use log::{debug, info, warn};
use polars::prelude::*;
use scraper::{ElementRef, Html, Selector};

const CELLS_PER_ROW: usize = 6;

/// Header rows and data rows, cell texts trimmed.
pub type RawTable = (Vec<Vec<String>>, Vec<Vec<String>>);

/// The crawled parameter table and the artifact it was saved under.
#[derive(Debug, Clone, PartialEq)]
pub struct DocTable {
    pub parameters: Vec<ParameterMetadata>,
    pub artifact: String,
}

impl DocTable {
    pub fn get(&self, index: usize) -> Option<&ParameterMetadata> {
        self.parameters.iter().find(|p| p.index == index)
    }
}

/// Column positions within a six-cell row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    name: usize,
    level_type: usize,
    level: usize,
    description: usize,
    unit: usize,
    value_range: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            name: 0,
            level_type: 1,
            level: 2,
            description: 3,
            unit: 4,
            value_range: 5,
        }
    }
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let labels: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |matches: fn(&str) -> bool, fallback: usize| {
            labels
                .iter()
                .position(|l| matches(l))
                .filter(|&i| i < CELLS_PER_ROW)
                .unwrap_or(fallback)
        };
        let defaults = Self::default();
        Self {
            name: find(|l| l.starts_with("parameter") || l == "name", defaults.name),
            level_type: find(
                |l| l.contains("level type") || l.contains("leveltype"),
                defaults.level_type,
            ),
            level: find(
                |l| l.starts_with("level") && !l.contains("type"),
                defaults.level,
            ),
            description: find(|l| l.contains("description"), defaults.description),
            unit: find(|l| l.starts_with("unit"), defaults.unit),
            value_range: find(|l| l.contains("value"), defaults.value_range),
        }
    }
}

fn selector(css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css).map_err(|e| CrawlError::Selector(e.to_string()))
}

fn cell_texts(row: ElementRef<'_>, cells: &Selector) -> Vec<String> {
    row.select(cells)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect()
}

pub struct DocCrawler {
    doc_url: String,
    container_id: String,
    expected_parameters: Vec<String>,
    row_policy: RowPolicy,
    table_name: String,
}

impl DocCrawler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            doc_url: config.doc_url.clone(),
            container_id: config.container_id.clone(),
            expected_parameters: config.expected_parameters.clone(),
            row_policy: config.doc_rows,
            table_name: config.parameter_table_name.clone(),
        }
    }

    pub fn doc_url(&self) -> &str {
        &self.doc_url
    }

    /// Fetches, parses, validates and persists the parameter table.
    pub fn crawl(
        &self,
        client: &ForecastClient,
        store: &ArtifactStore,
        prompt: &mut dyn Prompt,
    ) -> Result<DocTable, CrawlError> {
        let html = self.fetch(client)?;
        let (headers, rows) = self.parse(&html)?;
        let parameters = self.build_table(&headers, rows)?;
        self.validate(&parameters)?;
        let artifact = self.persist(&parameters, store, prompt)?;
        Ok(DocTable {
            parameters,
            artifact,
        })
    }

    /// GETs the documentation page through the shared client.
    pub fn fetch(&self, client: &ForecastClient) -> Result<String, CrawlError> {
        let response = client.get(&self.doc_url, None)?;
        Ok(response.body)
    }

    /// Collects header and data cell texts of every row inside the container.
    ///
    /// # Errors
    ///
    /// [`CrawlError::SchemaNotFound`] when no `div` carries the configured id.
    pub fn parse(&self, html: &str) -> Result<RawTable, CrawlError> {
        let document = Html::parse_document(html);
        let divs = selector("div")?;
        let rows_sel = selector("tr")?;
        let th = selector("th")?;
        let td = selector("td")?;

        let container = document
            .select(&divs)
            .find(|div| div.value().id() == Some(self.container_id.as_str()))
            .ok_or_else(|| CrawlError::SchemaNotFound {
                container: self.container_id.clone(),
                url: self.doc_url.clone(),
            })?;

        let mut headers = Vec::new();
        let mut rows = Vec::new();
        for row in container.select(&rows_sel) {
            let header = cell_texts(row, &th);
            if !header.is_empty() {
                headers.push(header);
            }
            rows.push(cell_texts(row, &td));
        }
        debug!(
            "Parsed {} header rows and {} rows from '{}'",
            headers.len(),
            rows.len(),
            self.container_id
        );
        Ok((headers, rows))
    }

    /// Keeps rows with exactly six cells and numbers them from 0.
    ///
    /// Rows without data cells (header rows) are always dropped. Other rows with
    /// the wrong cell count are dropped or fail the crawl according to the
    /// configured row policy.
    pub fn build_table(
        &self,
        headers: &[Vec<String>],
        rows: Vec<Vec<String>>,
    ) -> Result<Vec<ParameterMetadata>, CrawlError> {
        let columns = headers
            .iter()
            .find(|h| h.iter().any(|cell| !cell.is_empty()))
            .map(|h| ColumnMap::from_headers(h))
            .unwrap_or_default();

        let mut table = Vec::new();
        for (row_number, cells) in rows.into_iter().enumerate() {
            if cells.is_empty() {
                continue;
            }
            if cells.len() != CELLS_PER_ROW {
                match self.row_policy {
                    RowPolicy::Skip => {
                        debug!("Dropping row {} with {} cells", row_number, cells.len());
                        continue;
                    }
                    RowPolicy::Fail => {
                        return Err(CrawlError::MalformedRow {
                            row: row_number,
                            cells: cells.len(),
                        })
                    }
                }
            }
            table.push(ParameterMetadata {
                index: table.len(),
                name: cells[columns.name].clone(),
                unit: cells[columns.unit].clone(),
                description: cells[columns.description].clone(),
                level_type: cells[columns.level_type].clone(),
                level: cells[columns.level].clone(),
                value_range: cells[columns.value_range].clone(),
            });
        }
        info!("Built parameter table with {} entries", table.len());
        Ok(table)
    }

    /// Checks that every expected parameter key is listed.
    pub fn validate(&self, table: &[ParameterMetadata]) -> Result<(), CrawlError> {
        let missing: Vec<String> = self
            .expected_parameters
            .iter()
            .filter(|expected| {
                let expected = normalize_name(expected);
                !table.iter().any(|p| p.key() == expected)
            })
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        warn!("Documentation at {} drifted, missing {:?}", self.doc_url, missing);
        Err(CrawlError::SchemaDrift {
            missing,
            url: self.doc_url.clone(),
        })
    }

    /// Writes `index,name,unit,description,level_type,level,value_range`.
    pub fn persist(
        &self,
        table: &[ParameterMetadata],
        store: &ArtifactStore,
        prompt: &mut dyn Prompt,
    ) -> Result<String, CrawlError> {
        let mut df = parameter_frame(table).map_err(StoreError::from)?;
        let name = store.write_csv(&self.table_name, &mut df, prompt)?;
        info!("{}.{} holds {} parameters", name, CSV, table.len());
        Ok(name)
    }
}

fn parameter_frame(table: &[ParameterMetadata]) -> PolarsResult<DataFrame> {
    let text = |f: fn(&ParameterMetadata) -> &str| {
        table.iter().map(|p| f(p).to_string()).collect::<Vec<_>>()
    };
    df!(
        "index" => table.iter().map(|p| p.index as u32).collect::<Vec<_>>(),
        "name" => text(|p| p.name.as_str()),
        "unit" => text(|p| p.unit.as_str()),
        "description" => text(|p| p.description.as_str()),
        "level_type" => text(|p| p.level_type.as_str()),
        "level" => text(|p| p.level.as_str()),
        "value_range" => text(|p| p.value_range.as_str())
    )
}
