//! Hides typed input while a password is entered.

#[cfg(unix)]
use libc::c_int;

/// Turns terminal echo off on stdin until dropped.
#[cfg(unix)]
pub struct NoEcho {
    original: libc::termios,
}

#[cfg(unix)]
impl NoEcho {
    pub fn enable() -> std::io::Result<Self> {
        let original = get_termios(libc::STDIN_FILENO)?;
        let mut hidden = original;
        hidden.c_lflag &= !libc::ECHO;
        set_termios(libc::STDIN_FILENO, &hidden)?;
        Ok(Self { original })
    }
}

#[cfg(unix)]
impl Drop for NoEcho {
    fn drop(&mut self) {
        let _ = set_termios(libc::STDIN_FILENO, &self.original);
    }
}

#[cfg(unix)]
fn get_termios(fd: c_int) -> std::io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(termios)
}

#[cfg(unix)]
fn set_termios(fd: c_int, termios: &libc::termios) -> std::io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub struct NoEcho;

#[cfg(not(unix))]
impl NoEcho {
    pub fn enable() -> std::io::Result<Self> {
        Ok(Self)
    }
}
