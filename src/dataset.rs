use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};
use crate::normalize::is_missing;
use crate::persist::write_atomic;

pub const NAME_COLUMN: &str = "Facility Name";
pub const ADDRESS_COLUMN: &str = "Physical Address";
pub const CITY_COLUMN: &str = "City";
pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";
pub const QUERY_COLUMN: &str = "Geocode_Query";
pub const STATUS_COLUMN: &str = "Geocode_Status";

const REQUIRED_COLUMNS: [&str; 3] = [NAME_COLUMN, ADDRESS_COLUMN, CITY_COLUMN];
const MANAGED_COLUMNS: [&str; 4] = [
    LATITUDE_COLUMN,
    LONGITUDE_COLUMN,
    QUERY_COLUMN,
    STATUS_COLUMN,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStatus {
    Resolved,
    CityLevel,
    Failed,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeStatus::Resolved => "resolved",
            GeocodeStatus::CityLevel => "city_level",
            GeocodeStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "resolved" => Some(GeocodeStatus::Resolved),
            "city_level" => Some(GeocodeStatus::CityLevel),
            "failed" => Some(GeocodeStatus::Failed),
            _ => None,
        }
    }
}

/// One facility row. Columns the pipeline does not manage are carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FacilityRecord {
    pub name: String,
    pub address: Option<String>,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub matched_query: Option<String>,
    pub status: Option<GeocodeStatus>,
    cells: Vec<String>,
}

impl FacilityRecord {
    pub fn new(name: impl Into<String>, address: Option<&str>, city: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.map(str::to_string),
            city: city.into(),
            ..Self::default()
        }
    }

    /// Both coordinates present. Resolved records are never queried again.
    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn set_coordinates(&mut self, latitude: f64, longitude: f64) {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    name: usize,
    address: usize,
    city: usize,
    latitude: usize,
    longitude: usize,
    query: usize,
    status: usize,
}

/// Facility table with its column order.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    layout: Layout,
    records: Vec<FacilityRecord>,
}

impl Dataset {
    /// Builds a table with only the required and managed columns.
    pub fn from_records(records: Vec<FacilityRecord>) -> Self {
        let headers = REQUIRED_COLUMNS
            .iter()
            .chain(MANAGED_COLUMNS.iter())
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let layout = layout_for(&headers);
        let records = records
            .into_iter()
            .map(|mut record| {
                record.cells.resize(headers.len(), String::new());
                record
            })
            .collect();
        Self {
            headers,
            layout,
            records,
        }
    }

    pub fn read_csv<R: Read>(reader: R) -> AppResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        for required in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == required) {
                return Err(AppError::Dataset(format!("missing column `{required}`")));
            }
        }
        for managed in MANAGED_COLUMNS {
            if !headers.iter().any(|h| h == managed) {
                headers.push(managed.to_string());
            }
        }

        let layout = layout_for(&headers);
        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let mut cells = result?.iter().map(str::to_string).collect::<Vec<_>>();
            cells.resize(headers.len(), String::new());
            records.push(record_from_cells(row, cells, &layout));
        }

        Ok(Self {
            headers,
            layout,
            records,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let dataset = Self::read_csv(file)?;
        info!(path = %path.display(), records = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    pub fn to_csv_bytes(&self) -> AppResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for record in &self.records {
            writer.write_record(self.cells_for(record))?;
        }
        writer
            .into_inner()
            .map_err(|err| AppError::Io(io::Error::new(err.error().kind(), err.to_string())))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[FacilityRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&FacilityRecord> {
        self.records.get(index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut FacilityRecord> {
        self.records.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn cells_for(&self, record: &FacilityRecord) -> Vec<String> {
        let layout = &self.layout;
        let mut cells = record.cells.clone();
        cells.resize(self.headers.len(), String::new());
        cells[layout.name] = record.name.clone();
        cells[layout.address] = record.address.clone().unwrap_or_default();
        cells[layout.city] = record.city.clone();
        cells[layout.latitude] = record.latitude.map(|v| v.to_string()).unwrap_or_default();
        cells[layout.longitude] = record.longitude.map(|v| v.to_string()).unwrap_or_default();
        cells[layout.query] = record.matched_query.clone().unwrap_or_default();
        cells[layout.status] = record
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        cells
    }
}

fn layout_for(headers: &[String]) -> Layout {
    let position = |name: &str| headers.iter().position(|h| h == name).unwrap_or_default();
    Layout {
        name: position(NAME_COLUMN),
        address: position(ADDRESS_COLUMN),
        city: position(CITY_COLUMN),
        latitude: position(LATITUDE_COLUMN),
        longitude: position(LONGITUDE_COLUMN),
        query: position(QUERY_COLUMN),
        status: position(STATUS_COLUMN),
    }
}

fn record_from_cells(row: usize, cells: Vec<String>, layout: &Layout) -> FacilityRecord {
    let optional = |index: usize| {
        let value = cells[index].trim();
        (!is_missing(value)).then(|| value.to_string())
    };
    let coordinate = |index: usize, column: &str| {
        let value = optional(index)?;
        match value.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Some(parsed),
            _ => {
                warn!(row, column, value = value.as_str(), "ignoring unparseable coordinate");
                None
            }
        }
    };

    let name = cells[layout.name].trim().to_string();
    let city = cells[layout.city].trim().to_string();
    let address = optional(layout.address);
    let latitude = coordinate(layout.latitude, LATITUDE_COLUMN);
    let longitude = coordinate(layout.longitude, LONGITUDE_COLUMN);
    let matched_query = optional(layout.query);
    let status = optional(layout.status).as_deref().and_then(GeocodeStatus::parse);

    FacilityRecord {
        name,
        address,
        city,
        latitude,
        longitude,
        matched_query,
        status,
        cells,
    }
}

/// Picks the table a run works on: the previous output when resuming, so
/// results from before the interruption are kept, otherwise the input.
pub fn load_working_dataset(input: &Path, output: &Path, resuming: bool) -> AppResult<Dataset> {
    if resuming && output.exists() {
        info!(path = %output.display(), "resuming from previous output");
        return Dataset::open(output);
    }
    if resuming {
        warn!(
            path = %output.display(),
            "checkpoint present but output missing; starting from input"
        );
    }
    Dataset::open(input)
}

/// Destination for the working dataset, rewritten in full after each record.
pub trait DatasetSink: Send + Sync {
    fn write(&self, dataset: &Dataset) -> AppResult<()>;
}

pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DatasetSink for CsvFileSink {
    fn write(&self, dataset: &Dataset) -> AppResult<()> {
        write_atomic(&self.path, &dataset.to_csv_bytes()?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Keeps every written snapshot so tests can inspect write ordering.
    #[derive(Default)]
    pub struct MemorySink {
        snapshots: Mutex<Vec<Dataset>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn writes(&self) -> usize {
            self.snapshots.lock().len()
        }

        pub fn last(&self) -> Option<Dataset> {
            self.snapshots.lock().last().cloned()
        }
    }

    impl DatasetSink for MemorySink {
        fn write(&self, dataset: &Dataset) -> AppResult<()> {
            self.snapshots.lock().push(dataset.clone());
            Ok(())
        }
    }
}
