// 主窗口：创建 winit 窗口并建立 softbuffer Surface，绘制纯色背景
// 这个窗口就是第二个实例要激活的"主窗口"

use std::num::NonZeroU32;

use anyhow::{anyhow, Result};
use softbuffer::{Context, Surface};
use winit::{
    dpi::LogicalSize,
    event_loop::ActiveEventLoop,
    window::{Window, WindowAttributes},
};

pub const MAIN_WINDOW_TITLE: &str = "Connection Manager";
const BACKGROUND: u32 = 0x00_2B_2B_2B;

pub struct MainWindow {
    pub window: &'static Window,
    surface: Surface<&'static Window, &'static Window>,
    _context: Context<&'static Window>,
}

impl MainWindow {
    pub fn new(active: &ActiveEventLoop, width: u32, height: u32) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(MAIN_WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(width as f64, height as f64));
        let window = active.create_window(attrs)?;
        // 窗口在进程生命周期内存活，直接 leak 换取 'static
        let window: &'static Window = Box::leak(Box::new(window));
        let context = Context::new(window).map_err(|e| anyhow!("context create failed: {e}"))?;
        let surface =
            Surface::new(&context, window).map_err(|e| anyhow!("surface create failed: {e}"))?;
        let mut main = Self {
            window,
            surface,
            _context: context,
        };
        main.resize()?;
        Ok(main)
    }

    /// softbuffer 要先 resize 再获取缓冲
    pub fn resize(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            // 最小化时尺寸为 0，跳过
            return Ok(());
        };
        self.surface
            .resize(w, h)
            .map_err(|e| anyhow!("surface resize failed: {e}"))
    }

    pub fn redraw(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        let mut buffer = self
            .surface
            .buffer_mut()
            .map_err(|e| anyhow!("buffer acquire failed: {e}"))?;
        buffer.fill(BACKGROUND);
        buffer
            .present()
            .map_err(|e| anyhow!("buffer present failed: {e}"))
    }
}
