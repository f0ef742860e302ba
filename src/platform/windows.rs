//! Windows window enumeration, GDI capture and process control

use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits, GetWindowDC,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, TerminateProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_TERMINATE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId, IsWindow,
    IsWindowVisible, PrintWindow, PRINT_WINDOW_FLAGS,
};

use crate::capture::{CaptureSource, Frame};
use crate::error::{CaptureError, Result, WatchError};
use crate::process::ProcessEntry;
use crate::window::{WindowHandle, WindowInfo, WindowSource};

/// PW_CLIENTONLY | PW_RENDERFULLCONTENT: captures DirectX-composited
/// windows and works while the window is occluded.
const PW_FULL_CONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(3);

/// Visible top-level window enumeration via EnumWindows
pub struct SystemWindows;

extern "system" fn enum_windows_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = unsafe { &mut *(lparam.0 as *mut Vec<WindowInfo>) };

    unsafe {
        if !IsWindowVisible(hwnd).as_bool() {
            return BOOL(1);
        }

        let mut buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut buf) as usize;
        if len == 0 {
            return BOOL(1);
        }
        let title = String::from_utf16_lossy(&buf[..len]);

        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));

        windows.push(WindowInfo {
            handle: WindowHandle(hwnd.0 as isize),
            title,
            owner_pid: pid,
        });
    }

    BOOL(1)
}

impl WindowSource for SystemWindows {
    fn enumerate_visible_windows(&self) -> Vec<WindowInfo> {
        let mut windows: Vec<WindowInfo> = Vec::new();
        unsafe {
            let _ = EnumWindows(
                Some(enum_windows_cb),
                LPARAM(&mut windows as *mut Vec<WindowInfo> as isize),
            );
        }
        windows
    }
}

/// GDI-based frame capture using PrintWindow
pub struct GdiCapture;

impl CaptureSource for GdiCapture {
    fn capture(&self, handle: WindowHandle) -> std::result::Result<Frame, CaptureError> {
        let hwnd = HWND(handle.0 as *mut core::ffi::c_void);

        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(CaptureError::InvalidHandle);
            }

            let mut rect = RECT::default();
            GetWindowRect(hwnd, &mut rect).map_err(|_| CaptureError::InvalidHandle)?;
            let width = rect.right - rect.left;
            let height = rect.bottom - rect.top;
            if width <= 0 || height <= 0 {
                return Err(CaptureError::ZeroSize);
            }

            let window_dc = GetWindowDC(hwnd);
            if window_dc.is_invalid() {
                return Err(CaptureError::DeviceError("GetWindowDC failed".into()));
            }
            let mem_dc = CreateCompatibleDC(window_dc);
            let bitmap = CreateCompatibleBitmap(window_dc, width, height);
            let old = SelectObject(mem_dc, bitmap);

            let printed = PrintWindow(hwnd, mem_dc, PW_FULL_CONTENT).as_bool();

            let mut result = Err(CaptureError::DeviceError("PrintWindow failed".into()));
            if printed {
                let mut info = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width,
                        // Negative height: top-down rows, matching Frame
                        biHeight: -height,
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let mut bgra = vec![0u8; (width as usize) * (height as usize) * 4];
                let lines = GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    height as u32,
                    Some(bgra.as_mut_ptr() as *mut _),
                    &mut info,
                    DIB_RGB_COLORS,
                );

                if lines == height {
                    result = Frame::from_bgra(width as u32, height as u32, &bgra)
                        .ok_or_else(|| CaptureError::DeviceError("bitmap size mismatch".into()));
                } else {
                    result = Err(CaptureError::DeviceError("GetDIBits failed".into()));
                }
            }

            SelectObject(mem_dc, old);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(hwnd, window_dc);

            result
        }
    }
}

/// List all running processes via a ToolHelp snapshot
pub fn list_processes() -> Vec<ProcessEntry> {
    let mut entries = Vec::new();

    unsafe {
        let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
            return entries;
        };

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let name = String::from_utf16_lossy(
                    &entry.szExeFile[..entry
                        .szExeFile
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szExeFile.len())],
                );
                entries.push(ProcessEntry {
                    pid: entry.th32ProcessID,
                    name,
                });

                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }

        let _ = CloseHandle(snapshot);
    }

    entries
}

/// Check whether a process is still running by pid
pub fn process_exists(pid: u32) -> bool {
    // STILL_ACTIVE is 259 (STATUS_PENDING)
    const STILL_ACTIVE: u32 = 259;

    unsafe {
        if let Ok(handle) = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            let mut exit_code = 0u32;
            let alive = GetExitCodeProcess(handle, &mut exit_code).is_ok()
                && exit_code == STILL_ACTIVE;
            let _ = CloseHandle(handle);
            return alive;
        }
    }

    false
}

/// Terminate a process by pid
pub fn terminate(pid: u32) -> Result<()> {
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, pid).map_err(|e| {
            WatchError::TerminateFailed {
                pid,
                detail: e.to_string(),
            }
        })?;

        let result = TerminateProcess(handle, 1).map_err(|e| WatchError::TerminateFailed {
            pid,
            detail: e.to_string(),
        });
        let _ = CloseHandle(handle);
        result
    }
}
