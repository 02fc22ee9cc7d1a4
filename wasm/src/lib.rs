//! AudioWorklet binding
//!
//! The worklet script builds a [`CsaveProcessor`] through
//! [`CsaveProcessorBuilder`] in its constructor and forwards every
//! `process()` call to it:
//!
//! ```js
//! process(_inputs, outputs) {
//!     const output = outputs[0];
//!     // copy output channels into `this.block`, then back after the call
//!     const live = this.processor.process(this.block, output.length);
//!     ...
//!     return live;
//! }
//! ```

use csave_core::{
    FinishNotify, GeneratorConfig, Planar, Record, RenderDriver, StreamingGenerator,
    DEFAULT_SYMBOL_RATE,
};
use js_sys::Function;
use wasm_bindgen::prelude::*;
use web_sys::MessagePort;

/// Message posted on the worklet port when the stream ends
const STOPPED_MESSAGE: &str = "stopped";

/// Delivers the finish notification to the main thread
#[derive(Default)]
struct JsNotify {
    callback: Option<Function>,
    port: Option<MessagePort>,
}

impl FinishNotify for JsNotify {
    fn notify_finished(&mut self) {
        if let Some(port) = &self.port {
            let _ = port.post_message(&JsValue::from_str(STOPPED_MESSAGE));
        }
        if let Some(callback) = &self.callback {
            let _ = callback.call0(&JsValue::NULL);
        }
    }
}

/// Generator sample rates are whole Hz; fractional rates round to the nearest
/// one, and negative or NaN rates become 0 and are rejected at build time
fn whole_hz(sample_rate: f32) -> u32 {
    sample_rate.round() as u32
}

fn to_js(e: csave_core::CsaveError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct CsaveProcessorBuilder {
    sample_rate: u32,
    symbol_rate: f64,
    records: Vec<Record>,
    notify: JsNotify,
}

#[wasm_bindgen]
impl CsaveProcessorBuilder {
    /// `sample_rate` is the worklet global `sampleRate`, rounded to the
    /// nearest Hz
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f32) -> CsaveProcessorBuilder {
        CsaveProcessorBuilder {
            sample_rate: whole_hz(sample_rate),
            symbol_rate: DEFAULT_SYMBOL_RATE,
            records: Vec::new(),
            notify: JsNotify::default(),
        }
    }

    /// Symbols per second (0 keeps the default of 1200)
    #[wasm_bindgen(js_name = symbolRate)]
    pub fn symbol_rate(&mut self, symbol_rate: f64) {
        self.symbol_rate = symbol_rate;
    }

    /// Append a record; `preamble` defaults to 1 second
    #[wasm_bindgen(js_name = pushRecord)]
    pub fn push_record(&mut self, bytes: &[u8], preamble: Option<f64>) -> Result<(), JsValue> {
        let record = match preamble {
            Some(secs) => Record::with_preamble(secs, bytes).map_err(to_js)?,
            None => Record::new(bytes),
        };
        self.records.push(record);
        Ok(())
    }

    /// Callback invoked once when the stream has ended
    #[wasm_bindgen(js_name = onFinished)]
    pub fn on_finished(&mut self, callback: Function) {
        self.notify.callback = Some(callback);
    }

    /// Worklet port that receives a `"stopped"` message when the stream ends
    #[wasm_bindgen(js_name = finishPort)]
    pub fn finish_port(&mut self, port: MessagePort) {
        self.notify.port = Some(port);
    }

    pub fn build(self) -> Result<CsaveProcessor, JsValue> {
        let config = GeneratorConfig::new(self.sample_rate).with_symbol_rate(self.symbol_rate);
        let generator = StreamingGenerator::new(config, self.records).map_err(to_js)?;
        Ok(CsaveProcessor {
            driver: RenderDriver::new(generator, self.notify),
        })
    }
}

#[wasm_bindgen]
pub struct CsaveProcessor {
    driver: RenderDriver<JsNotify>,
}

#[wasm_bindgen]
impl CsaveProcessor {
    /// Render one quantum into `block`, which holds `channels` consecutive
    /// channel buffers. Returns false once the stream has ended.
    pub fn process(&mut self, block: &mut [f32], channels: usize) -> bool {
        self.driver.process(&mut Planar::new(block, channels))
    }

    /// Frames written by the last `process` call
    #[wasm_bindgen(js_name = lastFrames)]
    pub fn last_frames(&self) -> usize {
        self.driver.last_frames()
    }

    #[wasm_bindgen(getter)]
    pub fn live(&self) -> bool {
        self.driver.is_live()
    }
}

/// Render a whole payload at once, e.g. to fill an `AudioBuffer` for download
///
/// `sample_rate` is rounded to the nearest Hz, as in the builder.
#[wasm_bindgen(js_name = encodeSamples)]
pub fn encode_samples(
    sample_rate: f32,
    symbol_rate: f64,
    bytes: &[u8],
    preamble: Option<f64>,
) -> Result<Vec<f32>, JsValue> {
    let record = match preamble {
        Some(secs) => Record::with_preamble(secs, bytes).map_err(to_js)?,
        None => Record::new(bytes),
    };
    let config = GeneratorConfig::new(whole_hz(sample_rate)).with_symbol_rate(symbol_rate);
    let generator = StreamingGenerator::new(config, vec![record]).map_err(to_js)?;
    Ok(generator.collect())
}
