//! Naming worker threads at the OS level. Every failure here is ignored.

use std::thread::JoinHandle;

/// Linux limits thread names to 16 bytes including the terminating NUL.
#[cfg(target_os = "linux")]
const MAX_OS_NAME: usize = 15;

/// Fit `name` into the OS limit, keeping the tail, which is more likely to be distinct.
#[cfg(target_os = "linux")]
pub fn os_name(name: &str) -> String {
    if name.len() <= MAX_OS_NAME {
        return name.to_string();
    }
    let mut start = name.len() - (MAX_OS_NAME - 3);
    while !name.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &name[start..])
}

#[cfg(target_os = "linux")]
fn set_pthread_name(thread: libc::pthread_t, name: &str) {
    use std::ffi::CString;

    let name = match CString::new(os_name(name)) {
        Ok(name) => name,
        Err(_) => return,
    };
    let rc = unsafe { libc::pthread_setname_np(thread, name.as_ptr()) };
    if rc != 0 {
        log::trace!("pthread_setname_np({:?}) failed: {}", name, rc);
    }
}

/// Rename another thread, typically a worker from its driver.
#[cfg(target_os = "linux")]
pub fn set_thread_name(thread: &JoinHandle<()>, name: &str) {
    use std::os::unix::thread::JoinHandleExt;

    set_pthread_name(thread.as_pthread_t(), name);
}

/// Rename the calling thread.
#[cfg(target_os = "linux")]
pub fn set_current_thread_name(name: &str) {
    set_pthread_name(unsafe { libc::pthread_self() }, name);
}

#[cfg(not(target_os = "linux"))]
pub fn set_thread_name(_thread: &JoinHandle<()>, _name: &str) {}

#[cfg(not(target_os = "linux"))]
pub fn set_current_thread_name(_name: &str) {}
