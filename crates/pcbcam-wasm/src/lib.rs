#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::indexing_slicing)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `PcbCam` WASM module: Excellon/HPGL parsing and drilling/milling G-code generation.

pub mod error;
pub mod excellon;
pub mod gcode;
pub mod hpgl;
pub mod log;
pub mod model;
pub mod number;
pub mod parser;
pub mod session;

use std::cell::RefCell;

use serde::Serialize;
use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::error::ApiError;
use crate::gcode::{generate_drilling, generate_milling, DrillingConfig, MillingConfig};
use crate::log::{LogBook, LogEntry, LogRecord, Severity};
use crate::model::{Bounds, Model};
use crate::parser::{AnyParser, Capability, Parser};
use crate::session::{CancelToken, NullObserver, Observer, Outcome};

/// A parsed model together with the generator it feeds.
#[derive(Debug)]
struct LoadedModel {
    capability: Capability,
    model: Model,
}

thread_local! {
    static LAST_MODEL: RefCell<Option<LoadedModel>> = const { RefCell::new(None) };
}

fn store_model(loaded: Option<LoadedModel>) {
    LAST_MODEL.with(|m| {
        *m.borrow_mut() = loaded;
    });
}

fn saturate_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// How a parse run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// The whole input was read.
    Completed,
    /// The run was interrupted; no model was kept.
    Interrupted,
}

/// Metadata returned to JavaScript for a parsed file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMeta {
    /// Whether the parse completed or was interrupted.
    pub state: RunState,
    /// Generator the model feeds.
    pub capability: Capability,
    /// Bounds of all parsed coordinates, in micrometers.
    pub bounds: Option<Bounds>,
    /// Number of tools, including the default tool.
    pub tool_count: u32,
    /// Number of curves.
    pub curve_count: u32,
    /// Number of notices logged.
    pub notice_count: u32,
    /// Number of warnings logged.
    pub warning_count: u32,
    /// Every log record in arrival order.
    pub log: Vec<LogEntry>,
}

/// Records the log while forwarding every event to another observer.
struct Recorder<'a> {
    book: LogBook,
    forward: &'a mut dyn Observer,
}

impl Observer for Recorder<'_> {
    fn log(&mut self, record: LogRecord) {
        self.forward.log(record.clone());
        self.book.push(record);
    }

    fn started(&mut self, operation: &str) {
        self.forward.started(operation);
    }

    fn progress(&mut self, done: u64, total: u64) {
        self.forward.progress(done, total);
    }

    fn finished(&mut self) {
        self.forward.finished();
    }
}

/// Delivers log records to a JavaScript callback.
struct JsLogSink(js_sys::Function);

impl Observer for JsLogSink {
    fn log(&mut self, record: LogRecord) {
        if let Ok(value) = serde_wasm_bindgen::to_value(&record) {
            if let Err(error) = self.0.call1(&JsValue::NULL, &value) {
                debug!(?error, "log callback failed");
            }
        }
    }
}

/// Initialize the WASM module. Sets up the panic hook for debugging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Parse an Excellon drill program from raw bytes.
///
/// Returns `ParseMeta` as a `JsValue` via `serde-wasm-bindgen`. The model is
/// kept internally for [`drilling_program`], [`get_tools`] and [`get_curves`].
/// `on_log` receives each log record as it is produced.
///
/// # Errors
///
/// Returns the fatal error message if the file cannot be interpreted.
#[wasm_bindgen]
pub fn parse_excellon(data: &[u8], on_log: Option<js_sys::Function>) -> Result<JsValue, JsValue> {
    let parser = AnyParser::for_extension("drl").ok_or_else(|| unsupported("drl"))?;
    parse_with_callback(parser, data, on_log)
}

/// Parse an HPGL plotter program from raw bytes.
///
/// Same contract as [`parse_excellon`]; the model feeds [`milling_program`].
///
/// # Errors
///
/// Returns the fatal error message if the file cannot be interpreted.
#[wasm_bindgen]
pub fn parse_hpgl(data: &[u8], on_log: Option<js_sys::Function>) -> Result<JsValue, JsValue> {
    let parser = AnyParser::for_extension("plt").ok_or_else(|| unsupported("plt"))?;
    parse_with_callback(parser, data, on_log)
}

/// Parse a file, choosing the parser from the extension of `file_name`.
///
/// # Errors
///
/// Returns an error for unknown extensions and for fatal parse errors.
#[wasm_bindgen]
pub fn parse_file(
    file_name: &str,
    data: &[u8],
    on_log: Option<js_sys::Function>,
) -> Result<JsValue, JsValue> {
    let parser = AnyParser::for_file_name(file_name).ok_or_else(|| unsupported(file_name))?;
    parse_with_callback(parser, data, on_log)
}

fn unsupported(name: &str) -> JsValue {
    JsValue::from_str(&ApiError::UnsupportedFileType(name.to_string()).to_string())
}

fn parse_with_callback(
    parser: AnyParser,
    data: &[u8],
    on_log: Option<js_sys::Function>,
) -> Result<JsValue, JsValue> {
    let meta = match on_log {
        Some(callback) => parse_internal(parser, data, &mut JsLogSink(callback)),
        None => parse_internal(parser, data, &mut NullObserver),
    }
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&meta).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Internal parse logic shared between the wasm exports and native tests.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] when the parser reports a fatal condition.
#[doc(hidden)]
pub fn parse_internal(
    mut parser: AnyParser,
    data: &[u8],
    observer: &mut dyn Observer,
) -> Result<ParseMeta, ApiError> {
    let mut recorder = Recorder {
        book: LogBook::new(),
        forward: observer,
    };

    let outcome = match parser.parse(data, &mut recorder) {
        Ok(outcome) => outcome,
        Err(err) => {
            store_model(None);
            return Err(err.into());
        }
    };

    let capability = parser.capability();
    let model = parser.model();
    let meta = ParseMeta {
        state: match outcome {
            Outcome::Completed(()) => RunState::Completed,
            Outcome::Interrupted => RunState::Interrupted,
        },
        capability,
        bounds: model.bounds(),
        tool_count: saturate_u32(model.tools.len()),
        curve_count: saturate_u32(model.curves.len()),
        notice_count: recorder.book.count(Severity::Notice),
        warning_count: recorder.book.count(Severity::Warning),
        log: recorder.book.entries().to_vec(),
    };

    store_model(match outcome {
        Outcome::Completed(()) => Some(LoadedModel {
            capability,
            model: model.clone(),
        }),
        Outcome::Interrupted => None,
    });

    Ok(meta)
}

/// Convenience wrapper: parse an Excellon program without a log callback.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] when the parser reports a fatal condition.
#[doc(hidden)]
pub fn parse_excellon_internal(data: &[u8]) -> Result<ParseMeta, ApiError> {
    let parser = AnyParser::for_extension("drl")
        .ok_or_else(|| ApiError::UnsupportedFileType("drl".to_string()))?;
    parse_internal(parser, data, &mut NullObserver)
}

/// Convenience wrapper: parse an HPGL program without a log callback.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] when the parser reports a fatal condition.
#[doc(hidden)]
pub fn parse_hpgl_internal(data: &[u8]) -> Result<ParseMeta, ApiError> {
    let parser = AnyParser::for_extension("plt")
        .ok_or_else(|| ApiError::UnsupportedFileType("plt".to_string()))?;
    parse_internal(parser, data, &mut NullObserver)
}

/// Generate a drilling program from the last parsed Excellon model.
///
/// Exported to JavaScript as `generate_drilling`. `config` is a
/// `DrillingConfig`-shaped object; missing fields take their defaults.
///
/// # Errors
///
/// Returns an error if the configuration is malformed or no drilling model
/// is loaded.
#[wasm_bindgen(js_name = generate_drilling)]
pub fn drilling_program(config: JsValue) -> Result<String, JsValue> {
    let config: DrillingConfig = decode_config(config)?;
    drilling_program_internal(&config).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Generate a milling program from the last parsed HPGL model.
///
/// Exported to JavaScript as `generate_milling`.
///
/// # Errors
///
/// Returns an error if the configuration is malformed or no milling model
/// is loaded.
#[wasm_bindgen(js_name = generate_milling)]
pub fn milling_program(config: JsValue) -> Result<String, JsValue> {
    let config: MillingConfig = decode_config(config)?;
    milling_program_internal(&config).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn decode_config<T>(config: JsValue) -> Result<T, JsValue>
where
    T: serde::de::DeserializeOwned + Default,
{
    if config.is_undefined() || config.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(config)
        .map_err(|e| JsValue::from_str(&ApiError::Serialization(e.to_string()).to_string()))
}

/// Internal drilling generation shared between the wasm export and native tests.
///
/// # Errors
///
/// Returns [`ApiError::NoModel`] unless the last parse produced a drilling model.
#[doc(hidden)]
pub fn drilling_program_internal(config: &DrillingConfig) -> Result<String, ApiError> {
    with_model(Capability::Drilling, |model| {
        generate_drilling(model, config, &CancelToken::new(), &mut NullObserver)
    })
}

/// Internal milling generation shared between the wasm export and native tests.
///
/// # Errors
///
/// Returns [`ApiError::NoModel`] unless the last parse produced a milling model.
#[doc(hidden)]
pub fn milling_program_internal(config: &MillingConfig) -> Result<String, ApiError> {
    with_model(Capability::Milling, |model| {
        generate_milling(model, config, &CancelToken::new(), &mut NullObserver)
    })
}

fn with_model(
    capability: Capability,
    generate: impl FnOnce(&Model) -> Outcome<String>,
) -> Result<String, ApiError> {
    let label = match capability {
        Capability::Drilling => "drilling",
        Capability::Milling => "milling",
    };
    LAST_MODEL
        .with(|m| {
            m.borrow()
                .as_ref()
                .filter(|loaded| loaded.capability == capability)
                .map(|loaded| generate(&loaded.model))
        })
        .ok_or(ApiError::NoModel(label))?
        .completed()
        .ok_or(ApiError::Interrupted)
}

/// Retrieve the tool table of the last parsed model.
///
/// Returns an empty array if no model is loaded.
///
/// # Errors
///
/// Returns an error if the tools cannot be converted to JS values.
#[wasm_bindgen]
pub fn get_tools() -> Result<JsValue, JsValue> {
    let tools = LAST_MODEL.with(|m| {
        m.borrow().as_ref().map_or_else(Vec::new, |loaded| {
            loaded.model.tools.values().copied().collect::<Vec<_>>()
        })
    });
    serde_wasm_bindgen::to_value(&tools).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Retrieve the curves of the last parsed model.
///
/// Returns an empty array if no model is loaded.
///
/// # Errors
///
/// Returns an error if the curves cannot be converted to JS values.
#[wasm_bindgen]
pub fn get_curves() -> Result<JsValue, JsValue> {
    let curves = LAST_MODEL.with(|m| {
        m.borrow()
            .as_ref()
            .map_or_else(Vec::new, |loaded| loaded.model.curves.clone())
    });
    serde_wasm_bindgen::to_value(&curves).map_err(|e| JsValue::from_str(&e.to_string()))
}
