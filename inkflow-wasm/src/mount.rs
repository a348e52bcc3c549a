// Owns the requestAnimationFrame loop and the input listeners for a mounted
// canvas. Dropping a `Mount` cancels the pending frame and removes every
// listener.

use crate::{resize_canvas, window, Session};
use inkflow::PointerEvent;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AddEventListenerOptions, Event, EventTarget, HtmlCanvasElement, MouseEvent, TouchEvent, Window};

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

pub struct Mount {
    window: Window,
    frame: FrameCallback,
    frame_id: Rc<Cell<Option<i32>>>,
    listeners: Vec<Listener>,
}

impl Mount {
    pub fn new(canvas: &HtmlCanvasElement, session: &Session, pixel_ratio: f64) -> Result<Self, JsValue> {
        let window = window()?;
        let frame: FrameCallback = Rc::new(RefCell::new(None));
        let frame_id = Rc::new(Cell::new(None));

        {
            let session = Rc::clone(session);
            let window = window.clone();
            let next_frame = Rc::clone(&frame);
            let frame_id = Rc::clone(&frame_id);

            *frame.borrow_mut() = Some(Closure::new(move |timestamp: f64| {
                session.borrow_mut().animate(timestamp);

                if let Some(callback) = next_frame.borrow().as_ref() {
                    match window.request_animation_frame(callback.as_ref().unchecked_ref()) {
                        Ok(id) => frame_id.set(Some(id)),
                        Err(err) => log::error!("Cannot schedule the next frame: {:?}", err),
                    }
                }
            }));
        }

        let mut mount = Self {
            window,
            frame,
            frame_id,
            listeners: Vec::new(),
        };

        let canvas_target: &EventTarget = canvas.as_ref();

        mount.listen(canvas_target, "mousemove", false, {
            let session = Rc::clone(session);
            let canvas = canvas.clone();
            move |event| {
                if let Some(event) = event.dyn_ref::<MouseEvent>() {
                    let (x, y) = canvas_position(&canvas, event.client_x(), event.client_y(), pixel_ratio);
                    session.borrow_mut().handle_pointer(PointerEvent::Move { x, y });
                }
            }
        })?;

        mount.listen(canvas_target, "click", false, {
            let session = Rc::clone(session);
            let canvas = canvas.clone();
            move |event| {
                if let Some(event) = event.dyn_ref::<MouseEvent>() {
                    let (x, y) = canvas_position(&canvas, event.client_x(), event.client_y(), pixel_ratio);
                    session.borrow_mut().handle_pointer(PointerEvent::Click { x, y });
                }
            }
        })?;

        // Not passive, so that the page does not scroll while stirring.
        mount.listen(canvas_target, "touchmove", true, {
            let session = Rc::clone(session);
            let canvas = canvas.clone();
            move |event| {
                event.prevent_default();
                let touch = event
                    .dyn_ref::<TouchEvent>()
                    .and_then(|event| event.target_touches().get(0));
                if let Some(touch) = touch {
                    let (x, y) = canvas_position(&canvas, touch.client_x(), touch.client_y(), pixel_ratio);
                    session.borrow_mut().handle_pointer(PointerEvent::Touch { x, y });
                }
            }
        })?;

        let window_target: &EventTarget = mount.window.as_ref();
        let window_target = window_target.clone();
        mount.listen(&window_target, "resize", false, {
            let session = Rc::clone(session);
            let canvas = canvas.clone();
            move |_| {
                let width = canvas.client_width() as u32;
                let height = canvas.client_height() as u32;
                if let Err(err) = resize_canvas(&canvas, &session, width, height, pixel_ratio) {
                    log::error!("Cannot resize: {:?}", err);
                }
            }
        })?;

        mount.request_frame()?;
        log::debug!("Mounted");

        Ok(mount)
    }

    fn request_frame(&self) -> Result<(), JsValue> {
        if let Some(callback) = self.frame.borrow().as_ref() {
            let id = self
                .window
                .request_animation_frame(callback.as_ref().unchecked_ref())?;
            self.frame_id.set(Some(id));
        }

        Ok(())
    }

    fn listen<F>(
        &mut self,
        target: &EventTarget,
        kind: &'static str,
        blocking: bool,
        handler: F,
    ) -> Result<(), JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let callback = Closure::<dyn FnMut(Event)>::new(handler);

        if blocking {
            let options = AddEventListenerOptions::new();
            options.set_passive(false);
            target.add_event_listener_with_callback_and_add_event_listener_options(
                kind,
                callback.as_ref().unchecked_ref(),
                &options,
            )?;
        } else {
            target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        }

        self.listeners.push(Listener {
            target: target.clone(),
            kind,
            callback,
        });

        Ok(())
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        if let Some(id) = self.frame_id.take() {
            if let Err(err) = self.window.cancel_animation_frame(id) {
                log::warn!("Cannot cancel the animation frame: {:?}", err);
            }
        }

        for listener in self.listeners.drain(..) {
            if let Err(err) = listener.target.remove_event_listener_with_callback(
                listener.kind,
                listener.callback.as_ref().unchecked_ref(),
            ) {
                log::warn!("Cannot remove the {} listener: {:?}", listener.kind, err);
            }
        }

        // The frame callback holds a reference to itself.
        self.frame.borrow_mut().take();
        log::debug!("Unmounted");
    }
}

// Event coordinates are in CSS pixels relative to the viewport.
fn canvas_position(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32, pixel_ratio: f64) -> (f32, f32) {
    let rect = canvas.get_bounding_client_rect();
    let x = pixel_ratio * (f64::from(client_x) - rect.left());
    let y = pixel_ratio * (f64::from(client_y) - rect.top());
    (x as f32, y as f32)
}
