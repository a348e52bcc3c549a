mod mount;

use gloo_utils::format::JsValueSerdeExt;
use inkflow::{GlBackend, PointerEvent, Problem, Settings, SimulationSession};
use mount::Mount;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, Window};

pub(crate) type Session = Rc<RefCell<SimulationSession<GlBackend>>>;

#[wasm_bindgen]
pub struct Inkflow {
    canvas: HtmlCanvasElement,
    pixel_ratio: f64,
    session: Session,
    mount: Option<Mount>,
}

#[wasm_bindgen]
impl Inkflow {
    pub fn set_settings(&mut self, settings_object: &JsValue) -> Result<(), JsValue> {
        let settings: Settings = settings_object
            .into_serde()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        self.session
            .borrow_mut()
            .update(&Rc::new(settings))
            .map_err(into_js_error)
    }

    #[wasm_bindgen(constructor)]
    pub fn new(element_id: &str, settings_object: &JsValue) -> Result<Inkflow, JsValue> {
        if let Err(err) = console_log::init_with_level(log::Level::Debug) {
            web_sys::console::warn_1(&JsValue::from_str(&err.to_string()));
        }

        let settings: Rc<Settings> = match settings_object.into_serde() {
            Ok(settings) => Rc::new(settings),
            Err(msg) => return Err(JsValue::from_str(&msg.to_string())),
        };

        let (canvas, gl, physical_width, physical_height, pixel_ratio) =
            get_rendering_context(element_id)?;
        let context = Rc::new(gl);

        let session = GlBackend::new(&context)
            .and_then(|backend| {
                SimulationSession::new(backend, physical_width, physical_height, &settings)
            })
            .map_err(into_js_error)?;

        Ok(Self {
            canvas,
            pixel_ratio,
            session: Rc::new(RefCell::new(session)),
            mount: None,
        })
    }

    pub fn animate(&mut self, timestamp: f64) {
        self.session.borrow_mut().animate(timestamp);
    }

    // The session skips resizes that leave the canvas unchanged.
    pub fn resize(&mut self, logical_width: u32, logical_height: u32) -> Result<(), JsValue> {
        resize_canvas(
            &self.canvas,
            &self.session,
            logical_width,
            logical_height,
            self.pixel_ratio,
        )
    }

    // Pointer positions are in CSS pixels relative to the canvas.

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let (x, y) = self.to_physical(x, y);
        self.session
            .borrow_mut()
            .handle_pointer(PointerEvent::Move { x, y });
    }

    pub fn touch_move(&mut self, x: f32, y: f32) {
        let (x, y) = self.to_physical(x, y);
        self.session
            .borrow_mut()
            .handle_pointer(PointerEvent::Touch { x, y });
    }

    pub fn click(&mut self, x: f32, y: f32) {
        let (x, y) = self.to_physical(x, y);
        self.session
            .borrow_mut()
            .handle_pointer(PointerEvent::Click { x, y });
    }

    /// Drive the animation from `requestAnimationFrame` and listen for input
    /// on the canvas until [`unmount`](Self::unmount) is called.
    pub fn mount(&mut self) -> Result<(), JsValue> {
        if self.mount.is_some() {
            return Ok(());
        }

        self.mount = Some(Mount::new(&self.canvas, &self.session, self.pixel_ratio)?);
        Ok(())
    }

    pub fn unmount(&mut self) {
        self.mount = None;
    }

    pub fn dispose(mut self) {
        self.mount = None;

        match Rc::try_unwrap(self.session) {
            Ok(session) => session.into_inner().dispose(),
            Err(_) => log::warn!("The session is still in use and will be released later"),
        }
    }

    fn to_physical(&self, x: f32, y: f32) -> (f32, f32) {
        let pixel_ratio = self.pixel_ratio as f32;
        (pixel_ratio * x, pixel_ratio * y)
    }
}

pub(crate) fn resize_canvas(
    canvas: &HtmlCanvasElement,
    session: &Session,
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,
) -> Result<(), JsValue> {
    let (physical_width, physical_height) =
        physical_from_logical_size(logical_width, logical_height, pixel_ratio);

    canvas.set_width(physical_width);
    canvas.set_height(physical_height);

    session
        .borrow_mut()
        .resize(physical_width, physical_height)
        .map_err(into_js_error)
}

pub(crate) fn into_js_error(problem: Problem) -> JsValue {
    log::error!("{}", problem);
    JsValue::from_str(&problem.to_string())
}

pub fn get_rendering_context(
    element_id: &str,
) -> Result<(HtmlCanvasElement, glow::Context, u32, u32, f64), JsValue> {
    use web_sys::WebGl2RenderingContext as GL;

    set_panic_hook();

    let window = window()?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Cannot find the document"))?;
    let html_canvas = document.get_element_by_id(element_id).ok_or_else(|| {
        JsValue::from_str(&format!(
            "Cannot find a canvas element with id `{}`",
            element_id
        ))
    })?;
    let html_canvas: HtmlCanvasElement = html_canvas.dyn_into::<HtmlCanvasElement>()?;

    let pixel_ratio: f64 = window.device_pixel_ratio();
    let logical_width = html_canvas.client_width() as u32;
    let logical_height = html_canvas.client_height() as u32;
    let (physical_width, physical_height) =
        physical_from_logical_size(logical_width, logical_height, pixel_ratio);
    html_canvas.set_width(physical_width);
    html_canvas.set_height(physical_height);

    let options = ContextOptions {
        // The page shows through wherever there is no ink.
        alpha: true,
        depth: false,
        stencil: false,
        desynchronized: false,
        antialias: false,
        fail_if_major_performance_caveat: false,
        power_preference: "default",
        premultiplied_alpha: false,
        preserve_drawing_buffer: false,
    }
    .serialize()?;

    let gl = match html_canvas.get_context_with_context_options("webgl2", &options) {
        Ok(Some(gl)) => gl.dyn_into::<GL>()?,
        _ => return Err(into_js_error(Problem::UnsupportedContext)),
    };

    // Rendering into half float textures needs this extension on WebGL2.
    if gl.get_extension("EXT_color_buffer_float")?.is_none() {
        return Err(into_js_error(Problem::UnsupportedContext));
    }

    gl.disable(GL::BLEND);
    gl.disable(GL::DEPTH_TEST);

    Ok((
        html_canvas,
        glow::Context::from_webgl2_context(gl),
        physical_width,
        physical_height,
        pixel_ratio,
    ))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub desynchronized: bool,
    pub antialias: bool,
    pub fail_if_major_performance_caveat: bool,
    pub power_preference: &'static str,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
}

impl ContextOptions {
    pub fn serialize(&self) -> Result<JsValue, JsValue> {
        JsValue::from_serde(self).map_err(|err| JsValue::from_str(&err.to_string()))
    }
}

pub fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("The global `window` doesn’t exist"))
}

// https://github.com/rustwasm/console_error_panic_hook#readme
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn physical_from_logical_size(
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,
) -> (u32, u32) {
    (
        (pixel_ratio * f64::from(logical_width)) as u32,
        (pixel_ratio * f64::from(logical_height)) as u32,
    )
}
