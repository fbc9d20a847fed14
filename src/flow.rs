//! Application event loop.
//!
//! [`App`] drives a single [`Viewer`] from winit. Asset fetches never run on the event
//! loop: they are spawned on the tokio runtime (native) or the browser's executor (web)
//! and come back as [`ViewerEvent`]s through the event loop proxy.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and the GPU context, then starts the environment fetch
//! 2. `EnvironmentFetched` prefilters and installs the environment, then starts the model
//!    fetch
//! 3. `ModelProgress` events are logged while the model downloads
//! 4. `ModelFetched` uploads the model and attaches it to the scene
//!
//! Every `RedrawRequested` renders one frame and requests the next one.

use std::{fmt::Debug, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

#[cfg(target_arch = "wasm32")]
use crate::context::Context;
use crate::{
    config::ViewerConfig,
    context::Viewport,
    resources::{GltfAsset, HdrImage, Progress, load_gltf, load_hdr},
    viewer::Viewer,
};

/// Id of the canvas element the viewer renders into on the web.
pub const CANVAS_ID: &str = "canvas";

pub enum ViewerEvent {
    /// The GPU context finished its asynchronous setup.
    #[cfg(target_arch = "wasm32")]
    Initialized(anyhow::Result<Context>),
    EnvironmentFetched(anyhow::Result<HdrImage>),
    ModelProgress(Progress),
    ModelFetched(anyhow::Result<GltfAsset>),
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(res) => f
                .debug_tuple("Initialized")
                .field(&res.as_ref().map(|_| "Context"))
                .finish(),
            Self::EnvironmentFetched(res) => f
                .debug_tuple("EnvironmentFetched")
                .field(&res.as_ref().map(|hdr| (hdr.width(), hdr.height())))
                .finish(),
            Self::ModelProgress(progress) => {
                f.debug_tuple("ModelProgress").field(progress).finish()
            }
            Self::ModelFetched(res) => f
                .debug_tuple("ModelFetched")
                .field(&res.as_ref().map(|asset| &asset.name))
                .finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    viewer: Option<Viewer>,
    // set once the window was requested, so a second `resumed` does not start over
    started: bool,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            viewer: None,
            started: false,
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn(&self, fut: impl Future<Output = ViewerEvent> + Send + 'static) {
        let proxy = self.proxy.clone();
        self.async_runtime.spawn(async move {
            let event = fut.await;
            if proxy.send_event(event).is_err() {
                log::warn!("The event loop closed before a fetch completed");
            }
        });
    }

    #[cfg(target_arch = "wasm32")]
    fn spawn(&self, fut: impl Future<Output = ViewerEvent> + 'static) {
        let proxy = self.proxy.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let event = fut.await;
            if proxy.send_event(event).is_err() {
                log::warn!("The event loop closed before a fetch completed");
            }
        });
    }

    fn fetch_environment(&self) {
        let source = self.config.environment_source.clone();
        log::info!("Fetching environment map {}", source);
        self.spawn(async move { ViewerEvent::EnvironmentFetched(load_hdr(&source).await) });
    }

    fn fetch_model(&self) {
        let source = self.config.model_source.clone();
        let proxy = self.proxy.clone();
        log::info!("Fetching model {}", source);
        self.spawn(async move {
            let result = load_gltf(&source, move |progress| {
                // progress is best effort
                let _ = proxy.send_event(ViewerEvent::ModelProgress(progress));
            })
            .await;
            ViewerEvent::ModelFetched(result)
        });
    }

    fn start(&mut self, viewer: Viewer) {
        viewer.ctx.request_redraw();
        self.viewer = Some(viewer);
        self.fetch_environment();
    }

    #[cfg(target_arch = "wasm32")]
    fn window_attributes(&self) -> anyhow::Result<winit::window::WindowAttributes> {
        use anyhow::Context as _;
        use wasm_bindgen::JsCast;
        use winit::platform::web::WindowAttributesExtWebSys;

        let window = web_sys::window().context("no global window")?;
        let document = window.document().context("no document")?;
        let canvas = document
            .get_element_by_id(CANVAS_ID)
            .with_context(|| format!("no canvas element with id '{}'", CANVAS_ID))?;
        let canvas: web_sys::HtmlCanvasElement = canvas
            .dyn_into()
            .map_err(|_| anyhow::anyhow!("element '{}' is not a canvas", CANVAS_ID))?;
        Ok(Window::default_attributes().with_canvas(Some(canvas)))
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn window_attributes(&self) -> anyhow::Result<winit::window::WindowAttributes> {
        Ok(Window::default_attributes().with_title("HDRI viewer"))
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        let window_attributes = match self.window_attributes() {
            Ok(attributes) => attributes,
            Err(e) => {
                log::error!("Cannot find the viewport: {:#}", e);
                event_loop.exit();
                return;
            }
        };
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let ctx = self
                .async_runtime
                .block_on(crate::context::Context::new(window, &self.config));
            match ctx {
                Ok(ctx) => self.start(Viewer::new(ctx, self.config.clone())),
                Err(e) => {
                    log::error!("App initialization failed: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let config = self.config.clone();
            self.spawn(async move { ViewerEvent::Initialized(Context::new(window, &config).await) });
        }
    }

    #[allow(unused_variables)]
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(Ok(ctx)) => {
                let mut viewer = Viewer::new(ctx, self.config.clone());
                // the canvas may have been resized while the device was requested
                if let Some(window) = viewer.ctx.window().cloned() {
                    viewer.resize(Viewport::from_physical(
                        window.inner_size(),
                        window.scale_factor(),
                    ));
                }
                self.start(viewer);
            }
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(Err(e)) => {
                log::error!("App initialization failed: {:#}", e);
                event_loop.exit();
            }
            ViewerEvent::EnvironmentFetched(result) => {
                let Some(viewer) = &mut self.viewer else {
                    return;
                };
                if viewer.install_environment(result) {
                    self.fetch_model();
                }
            }
            ViewerEvent::ModelProgress(progress) => {
                if let Some(viewer) = &self.viewer {
                    viewer.report_progress(progress);
                }
            }
            ViewerEvent::ModelFetched(result) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.attach_model(result);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let viewer = match &mut self.viewer {
            Some(viewer) => viewer,
            None => return,
        };

        viewer.input(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let scale_factor = viewer.ctx.viewport().scale_factor;
                viewer.resize(Viewport::from_physical(size, scale_factor));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(window) = viewer.ctx.window().cloned() {
                    viewer.resize(Viewport::from_physical(window.inner_size(), scale_factor));
                }
            }
            WindowEvent::RedrawRequested => {
                match viewer.frame() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        viewer.ctx.configure_surface();
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                viewer.ctx.request_redraw();
            }
            _ => {}
        }
    }
}

/// Open the viewer and run it until the window is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
