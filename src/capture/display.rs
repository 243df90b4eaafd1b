//! Thin adapter over the X11 connection, exposing only the operations the
//! capture pipeline consumes.

use thiserror::Error;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::{composite, damage, shm, xfixes, xproto, Event};
use x11rb::rust_connection::RustConnection;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("cannot connect to X display: {0}")]
    Connect(#[from] ConnectError),
    #[error("display connection failed: {0}")]
    Connection(#[from] ConnectionError),
    #[error("display request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("cannot allocate X resource id: {0}")]
    Id(#[from] ReplyOrIdError),
    #[error("required X extension {0} is missing")]
    MissingExtension(&'static str),
    #[error("window {0:#x} is already redirected by another client")]
    AlreadyCaptured(u32),
}

/// Current size of the captured window; mutated only on resize
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
    pub border: u16,
}

pub struct Pointer {
    pub x: i16,
    pub y: i16,
    pub same_screen: bool,
}

pub struct CursorImage {
    /// Premultiplied ARGB, row-major, alpha in the top byte.
    pub pixels: Vec<u32>,
    pub width: u16,
    pub height: u16,
    pub xhot: u16,
    pub yhot: u16,
    /// Hotspot position in root coordinates.
    pub x: i16,
    pub y: i16,
}

pub struct Display {
    conn: RustConnection,
    root: xproto::Window,
}

impl Display {
    /// Connect and negotiate the Composite, Damage, XFIXES, and MIT-SHM
    /// extensions. All four are mandatory.
    pub fn open() -> Result<Self, DisplayError> {
        let (conn, screen_num) = RustConnection::connect(None)?;

        for name in [
            composite::X11_EXTENSION_NAME,
            damage::X11_EXTENSION_NAME,
            xfixes::X11_EXTENSION_NAME,
            shm::X11_EXTENSION_NAME,
        ] {
            if conn.extension_information(name)?.is_none() {
                return Err(DisplayError::MissingExtension(name));
            }
        }
        composite::query_version(&conn, 0, 4)?.reply()?;
        damage::query_version(&conn, 1, 1)?.reply()?;
        xfixes::query_version(&conn, 4, 0)?.reply()?;
        shm::query_version(&conn)?.reply()?;

        let root = conn.setup().roots[screen_num].root;
        Ok(Display { conn, root })
    }

    pub fn root(&self) -> xproto::Window {
        self.root
    }

    /// Redirect the window's rendering into an off-screen pixmap. An X
    /// Access error means another client holds the redirect.
    pub fn redirect_window(&self, window: xproto::Window) -> Result<(), DisplayError> {
        let checked =
            composite::redirect_window(&self.conn, window, composite::Redirect::AUTOMATIC)?
                .check();
        match checked {
            Ok(()) => Ok(()),
            Err(ReplyError::X11Error(ref e))
                if e.error_kind == x11rb::protocol::ErrorKind::Access =>
            {
                Err(DisplayError::AlreadyCaptured(window))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bind a fresh pixmap id to the redirected window contents. Must be
    /// re-issued after every resize.
    pub fn name_window_pixmap(
        &self,
        window: xproto::Window,
    ) -> Result<xproto::Pixmap, DisplayError> {
        let pixmap = self.conn.generate_id()?;
        composite::name_window_pixmap(&self.conn, window, pixmap)?.check()?;
        Ok(pixmap)
    }

    pub fn free_pixmap(&self, pixmap: xproto::Pixmap) -> Result<(), DisplayError> {
        xproto::free_pixmap(&self.conn, pixmap)?.check()?;
        Ok(())
    }

    pub fn get_geometry(&self, window: xproto::Window) -> Result<Geometry, DisplayError> {
        let reply = xproto::get_geometry(&self.conn, window)?.reply()?;
        Ok(Geometry {
            width: reply.width,
            height: reply.height,
            border: reply.border_width,
        })
    }

    pub fn translate_coordinates(
        &self,
        src: xproto::Window,
        dst: xproto::Window,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), DisplayError> {
        let reply = xproto::translate_coordinates(&self.conn, src, dst, x, y)?.reply()?;
        Ok((reply.dst_x, reply.dst_y))
    }

    pub fn query_pointer(&self, window: xproto::Window) -> Result<Pointer, DisplayError> {
        let reply = xproto::query_pointer(&self.conn, window)?.reply()?;
        Ok(Pointer {
            x: reply.win_x,
            y: reply.win_y,
            same_screen: reply.same_screen,
        })
    }

    pub fn cursor_image(&self) -> Result<CursorImage, DisplayError> {
        let reply = xfixes::get_cursor_image(&self.conn)?.reply()?;
        Ok(CursorImage {
            pixels: reply.cursor_image,
            width: reply.width,
            height: reply.height,
            xhot: reply.xhot,
            yhot: reply.yhot,
            x: reply.x,
            y: reply.y,
        })
    }

    /// Attach our SysV segment on the server side so `get_image` writes
    /// pixels straight into the page pool.
    pub fn attach_shm(&self, shmid: i32) -> Result<shm::Seg, DisplayError> {
        let seg = self.conn.generate_id()?;
        shm::attach(&self.conn, seg, shmid as u32, false)?.check()?;
        Ok(seg)
    }

    pub fn shm_get_image(
        &self,
        drawable: xproto::Drawable,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        seg: shm::Seg,
        offset: u32,
    ) -> Result<(), DisplayError> {
        shm::get_image(
            &self.conn,
            drawable,
            x,
            y,
            width,
            height,
            !0, // all planes
            xproto::ImageFormat::Z_PIXMAP.into(),
            seg,
            offset,
        )?
        .reply()?;
        Ok(())
    }

    pub fn create_damage(&self, window: xproto::Window) -> Result<damage::Damage, DisplayError> {
        let id = self.conn.generate_id()?;
        damage::create(&self.conn, id, window, damage::ReportLevel::NON_EMPTY)?.check()?;
        Ok(id)
    }

    /// Acknowledge pending damage so the server keeps reporting.
    pub fn subtract_damage(&self, damage_id: damage::Damage) -> Result<(), DisplayError> {
        damage::subtract(&self.conn, damage_id, x11rb::NONE, x11rb::NONE)?.check()?;
        Ok(())
    }

    pub fn watch_structure(&self, window: xproto::Window) -> Result<(), DisplayError> {
        let values = xproto::ChangeWindowAttributesAux::new()
            .event_mask(xproto::EventMask::STRUCTURE_NOTIFY);
        xproto::change_window_attributes(&self.conn, window, &values)?.check()?;
        Ok(())
    }

    pub fn wait_for_event(&self) -> Result<Event, DisplayError> {
        Ok(self.conn.wait_for_event()?)
    }
}
