use anyhow::Result;
use log::{error, info, warn};
use winit::{
    event::{Event, WindowEvent},
    event_loop::EventLoop,
};

use conn_launcher::window_manager::MainWindow;
use conn_launcher::{Coordinator, Role, Settings};

fn main() -> Result<()> {
    env_logger::init();
    install_panic_hook();
    info!("starting conn-launcher");

    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("{e}; falling back to default settings");
        Settings::default()
    });
    if !settings.single_instance {
        return run_application();
    }

    let mut coordinator = Coordinator::with_os_defaults(settings.lock_name.as_str());
    match coordinator.acquire_or_activate() {
        Ok(Role::Secondary) => {
            info!("another instance is already running; exiting");
            Ok(())
        }
        Ok(Role::Primary) => {
            let result = run_application();
            // 先释放锁再退出，新实例可以立即成为主实例
            coordinator.release();
            result
        }
        Err(e) => {
            // 创建锁失败：不阻止启动
            warn!("{e}; starting without single instance protection");
            run_application()
        }
    }
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("unhandled panic: {info}");
        default_hook(info);
    }));
}

#[allow(deprecated)]
fn run_application() -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut main_window: Option<MainWindow> = None;
    event_loop.run(|event, elwt| match event {
        Event::Resumed => {
            if main_window.is_none() {
                match MainWindow::new(elwt, 1024, 640) {
                    Ok(w) => main_window = Some(w),
                    Err(e) => {
                        error!("failed to create main window: {e}");
                        elwt.exit();
                    }
                }
            }
        }
        Event::WindowEvent { event, window_id } => {
            let Some(mw) = main_window.as_mut() else {
                return;
            };
            if window_id != mw.window.id() {
                return;
            }
            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(_) => {
                    if let Err(e) = mw.resize() {
                        warn!("{e}");
                    }
                    mw.window.request_redraw();
                }
                WindowEvent::RedrawRequested => {
                    if let Err(e) = mw.redraw() {
                        warn!("{e}");
                    }
                }
                _ => {}
            }
        }
        _ => {}
    })?;
    info!("main window closed");
    Ok(())
}
