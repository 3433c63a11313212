//! `odbc-api` backend for [`DatabaseDriver`].
//!
//! Requests without pre-connection attributes go through `odbc-api`. It has
//! no hook between allocating a connection handle and connecting, so requests
//! that carry attributes (the access token under `SQL_COPT_SS_ACCESS_TOKEN`)
//! are opened on raw driver-manager handles instead.

use odbc_api::buffers::TextRowSet;
use odbc_api::sys::NULL_DATA;
use odbc_api::{ConnectionOptions, Cursor, Environment};
use tracing::debug;

use super::{DatabaseConnection, DatabaseDriver, DriverConnectString, PreConnectAttributes};
use crate::error::ConnectError;

const FETCH_BATCH_ROWS: usize = 1000;
const MAX_FIELD_BYTES: usize = 4096;

/// Driver backed by the system ODBC driver manager.
pub struct OdbcDriver {
    env: Environment,
    raw_env: raw::RawEnvironment,
}

impl OdbcDriver {
    pub fn new() -> Result<Self, ConnectError> {
        let env = Environment::new().map_err(|e| ConnectError::Driver {
            message: format!("ODBC environment error: {e}"),
        })?;
        let raw_env = raw::RawEnvironment::new()?;
        Ok(Self { env, raw_env })
    }
}

impl DatabaseDriver for OdbcDriver {
    type Connection<'d> = OdbcConnection<'d> where Self: 'd;

    fn connect<'d>(
        &'d self,
        connection_string: &DriverConnectString,
        attrs_before: &PreConnectAttributes,
    ) -> Result<Self::Connection<'d>, ConnectError> {
        let plain = connection_string.decoded()?;
        debug!(
            connection_string = %connection_string.redacted(),
            attributes = ?attrs_before.keys().collect::<Vec<_>>(),
            "odbc connect"
        );

        if attrs_before.is_empty() {
            let conn = self
                .env
                .connect_with_connection_string(&plain, ConnectionOptions::default())
                .map_err(|e| ConnectError::Driver {
                    message: e.to_string(),
                })?;
            return Ok(OdbcConnection::Managed(conn));
        }

        let attrs = attribute_values(attrs_before)?;
        let conn = self.raw_env.connect(&plain, &attrs)?;
        Ok(OdbcConnection::WithAttributes(conn))
    }
}

/// Open ODBC connection.
pub enum OdbcConnection<'env> {
    Managed(odbc_api::Connection<'env>),
    WithAttributes(raw::RawConnection<'env>),
}

impl DatabaseConnection for OdbcConnection<'_> {
    fn query_column(&mut self, sql: &str) -> Result<Vec<String>, ConnectError> {
        match self {
            Self::Managed(conn) => query_managed(conn, sql),
            Self::WithAttributes(conn) => conn.query_column(sql, MAX_FIELD_BYTES),
        }
    }

    fn close(self) -> Result<(), ConnectError> {
        match self {
            Self::Managed(conn) => {
                drop(conn);
                Ok(())
            }
            Self::WithAttributes(conn) => conn.close(),
        }
    }
}

fn query_managed(conn: &odbc_api::Connection<'_>, sql: &str) -> Result<Vec<String>, ConnectError> {
    let query_err = |e: odbc_api::Error| ConnectError::Query {
        message: e.to_string(),
    };

    let Some(mut cursor) = conn.execute(sql, (), None).map_err(query_err)? else {
        return Ok(Vec::new());
    };

    let buffer = TextRowSet::for_cursor(FETCH_BATCH_ROWS, &mut cursor, Some(MAX_FIELD_BYTES))
        .map_err(query_err)?;
    let mut row_set_cursor = cursor.bind_buffer(buffer).map_err(query_err)?;

    let mut values = Vec::new();
    while let Some(batch) = row_set_cursor.fetch().map_err(query_err)? {
        for row in 0..batch.num_rows() {
            let value = batch
                .at(0, row)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            values.push(value);
        }
    }
    Ok(values)
}

/// A pre-connection attribute ready for `SQLSetConnectAttr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeValue<'a> {
    pub key: i32,
    pub value: &'a [u8],
    pub len: i32,
}

fn attribute_values(attrs: &PreConnectAttributes) -> Result<Vec<AttributeValue<'_>>, ConnectError> {
    attrs
        .iter()
        .map(|(key, value)| {
            let len = i32::try_from(value.len()).map_err(|_| ConnectError::Attribute {
                key: *key,
                message: format!("value of {} bytes is too long", value.len()),
            })?;
            Ok(AttributeValue {
                key: *key,
                value,
                len,
            })
        })
        .collect()
}

/// Text of one `SQLGetData` character field; `buf` holds a trailing NUL.
fn field_text(buf: &[u8], indicator: isize) -> String {
    let cap = buf.len().saturating_sub(1);
    let len = match usize::try_from(indicator) {
        Ok(len) => len.min(cap),
        Err(_) if indicator == NULL_DATA => return String::new(),
        // Total length unknown; the driver still NUL-terminated what it wrote.
        Err(_) => buf[..cap].iter().position(|b| *b == 0).unwrap_or(cap),
    };
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[allow(unsafe_code)]
mod raw {
    //! Driver-manager handles for connections that need attributes set before
    //! connecting. Every handle is freed on drop.

    use std::marker::PhantomData;
    use std::ptr::null_mut;

    use odbc_api::sys::{
        CDataType, ConnectionAttribute, DriverConnectOption, EnvironmentAttribute, HDbc, HEnv,
        HStmt, Handle, HandleType, Integer, Len, Pointer, SQLAllocHandle, SQLDisconnect,
        SQLDriverConnect, SQLExecDirect, SQLFetch, SQLFreeHandle, SQLGetData, SQLGetDiagRec,
        SQLSetConnectAttr, SQLSetEnvAttr, SmallInt, SqlReturn,
    };
    use tracing::warn;

    use super::{field_text, AttributeValue};
    use crate::error::ConnectError;

    const ODBC_VERSION_3: usize = 3;

    fn succeeded(ret: SqlReturn) -> bool {
        ret == SqlReturn::SUCCESS || ret == SqlReturn::SUCCESS_WITH_INFO
    }

    /// First diagnostic record on `handle`, prefixed with the failing call.
    fn diagnostic(handle_type: HandleType, handle: Handle, call: &str) -> String {
        let mut state = [0u8; 6];
        let mut native: Integer = 0;
        let mut message = [0u8; 1024];
        let mut text_len: SmallInt = 0;

        // SAFETY: every buffer outlives the call and its capacity is passed along.
        let ret = unsafe {
            SQLGetDiagRec(
                handle_type,
                handle,
                1,
                state.as_mut_ptr(),
                &mut native,
                message.as_mut_ptr(),
                message.len() as SmallInt,
                &mut text_len,
            )
        };
        if !succeeded(ret) {
            return format!("{call} failed");
        }

        let len = usize::try_from(text_len)
            .unwrap_or(0)
            .min(message.len() - 1);
        format!(
            "{call} failed: [{}] {}",
            String::from_utf8_lossy(&state[..5]),
            String::from_utf8_lossy(&message[..len])
        )
    }

    fn driver_error(message: String) -> ConnectError {
        ConnectError::Driver { message }
    }

    pub struct RawEnvironment {
        handle: HEnv,
    }

    impl RawEnvironment {
        pub fn new() -> Result<Self, ConnectError> {
            let mut handle: Handle = null_mut();
            // SAFETY: an environment is allocated with a null parent handle.
            let ret = unsafe { SQLAllocHandle(HandleType::Env, null_mut(), &mut handle) };
            if !succeeded(ret) {
                return Err(driver_error("SQLAllocHandle(ENV) failed".into()));
            }
            let env = Self {
                handle: handle as HEnv,
            };

            // SAFETY: `env.handle` is a live environment; the version is passed by value.
            let ret = unsafe {
                SQLSetEnvAttr(
                    env.handle,
                    EnvironmentAttribute::OdbcVersion,
                    ODBC_VERSION_3 as Pointer,
                    0,
                )
            };
            if !succeeded(ret) {
                return Err(driver_error(diagnostic(
                    HandleType::Env,
                    env.handle as Handle,
                    "SQLSetEnvAttr",
                )));
            }
            Ok(env)
        }

        /// Allocate a connection, apply `attrs`, then connect.
        pub fn connect(
            &self,
            connection_string: &str,
            attrs: &[AttributeValue<'_>],
        ) -> Result<RawConnection<'_>, ConnectError> {
            let conn_str_len = SmallInt::try_from(connection_string.len()).map_err(|_| {
                ConnectError::InvalidConnectionString {
                    message: format!("{} bytes exceeds the driver limit", connection_string.len()),
                }
            })?;

            let mut handle: Handle = null_mut();
            // SAFETY: `self.handle` is a live environment with ODBC 3 set.
            let ret = unsafe { SQLAllocHandle(HandleType::Dbc, self.handle as Handle, &mut handle) };
            if !succeeded(ret) {
                return Err(driver_error(diagnostic(
                    HandleType::Env,
                    self.handle as Handle,
                    "SQLAllocHandle(DBC)",
                )));
            }
            let mut conn = RawConnection {
                handle: handle as HDbc,
                connected: false,
                _env: PhantomData,
            };

            for attr in attrs {
                // SAFETY: `attr.value` is borrowed for this whole function, so it
                // stays valid through SQLDriverConnect below.
                let ret = unsafe {
                    SQLSetConnectAttr(
                        conn.handle,
                        ConnectionAttribute(attr.key),
                        attr.value.as_ptr().cast_mut().cast(),
                        attr.len,
                    )
                };
                if !succeeded(ret) {
                    return Err(ConnectError::Attribute {
                        key: attr.key,
                        message: conn.diagnostic("SQLSetConnectAttr"),
                    });
                }
            }

            // SAFETY: the input string and its length come from the same `&str`;
            // no output buffer is requested.
            let ret = unsafe {
                SQLDriverConnect(
                    conn.handle,
                    null_mut(),
                    connection_string.as_ptr(),
                    conn_str_len,
                    null_mut(),
                    0,
                    null_mut(),
                    DriverConnectOption::NoPrompt,
                )
            };
            if !succeeded(ret) {
                return Err(driver_error(conn.diagnostic("SQLDriverConnect")));
            }
            conn.connected = true;
            Ok(conn)
        }
    }

    impl Drop for RawEnvironment {
        fn drop(&mut self) {
            // SAFETY: connections borrow the environment, so none outlive it.
            unsafe {
                SQLFreeHandle(HandleType::Env, self.handle as Handle);
            }
        }
    }

    /// Connection opened on a raw handle.
    pub struct RawConnection<'env> {
        handle: HDbc,
        connected: bool,
        _env: PhantomData<&'env RawEnvironment>,
    }

    impl RawConnection<'_> {
        fn diagnostic(&self, call: &str) -> String {
            diagnostic(HandleType::Dbc, self.handle as Handle, call)
        }

        /// First column of every row, as text.
        pub fn query_column(
            &mut self,
            sql: &str,
            max_field_bytes: usize,
        ) -> Result<Vec<String>, ConnectError> {
            let query_err = |message: String| ConnectError::Query { message };
            let sql_len = Integer::try_from(sql.len())
                .map_err(|_| query_err(format!("statement of {} bytes is too long", sql.len())))?;

            let stmt = Statement::new(self)?;

            // SAFETY: the statement text and its length come from the same `&str`.
            let ret = unsafe { SQLExecDirect(stmt.handle, sql.as_ptr(), sql_len) };
            if ret == SqlReturn::NO_DATA {
                return Ok(Vec::new());
            }
            if !succeeded(ret) {
                return Err(query_err(stmt.diagnostic("SQLExecDirect")));
            }

            let mut buf = vec![0u8; max_field_bytes + 1];
            let mut values = Vec::new();
            loop {
                // SAFETY: `stmt.handle` has an open cursor from SQLExecDirect.
                let ret = unsafe { SQLFetch(stmt.handle) };
                if ret == SqlReturn::NO_DATA {
                    break;
                }
                if !succeeded(ret) {
                    return Err(query_err(stmt.diagnostic("SQLFetch")));
                }

                let mut indicator: Len = 0;
                // SAFETY: `buf` outlives the call and its full length is passed.
                let ret = unsafe {
                    SQLGetData(
                        stmt.handle,
                        1,
                        CDataType::Char,
                        buf.as_mut_ptr().cast(),
                        buf.len() as Len,
                        &mut indicator,
                    )
                };
                if !succeeded(ret) {
                    return Err(query_err(stmt.diagnostic("SQLGetData")));
                }
                values.push(field_text(&buf, indicator));
            }
            Ok(values)
        }

        pub fn close(mut self) -> Result<(), ConnectError> {
            // SAFETY: the handle is connected and no statement is open.
            let ret = unsafe { SQLDisconnect(self.handle) };
            self.connected = false;
            if !succeeded(ret) {
                return Err(driver_error(self.diagnostic("SQLDisconnect")));
            }
            Ok(())
        }
    }

    impl Drop for RawConnection<'_> {
        fn drop(&mut self) {
            // SAFETY: the handle was allocated by `RawEnvironment::connect` and is
            // released exactly once here.
            unsafe {
                if self.connected {
                    let ret = SQLDisconnect(self.handle);
                    if !succeeded(ret) {
                        warn!("SQLDisconnect failed while dropping connection");
                    }
                }
                SQLFreeHandle(HandleType::Dbc, self.handle as Handle);
            }
        }
    }

    struct Statement<'c> {
        handle: HStmt,
        _conn: PhantomData<&'c ()>,
    }

    impl<'c> Statement<'c> {
        fn new(conn: &'c RawConnection<'_>) -> Result<Self, ConnectError> {
            let mut handle: Handle = null_mut();
            // SAFETY: `conn.handle` is a connected connection handle.
            let ret = unsafe { SQLAllocHandle(HandleType::Stmt, conn.handle as Handle, &mut handle) };
            if !succeeded(ret) {
                return Err(ConnectError::Query {
                    message: conn.diagnostic("SQLAllocHandle(STMT)"),
                });
            }
            Ok(Self {
                handle: handle as HStmt,
                _conn: PhantomData,
            })
        }

        fn diagnostic(&self, call: &str) -> String {
            diagnostic(HandleType::Stmt, self.handle as Handle, call)
        }
    }

    impl Drop for Statement<'_> {
        fn drop(&mut self) {
            // SAFETY: allocated in `Statement::new`, released once.
            unsafe {
                SQLFreeHandle(HandleType::Stmt, self.handle as Handle);
            }
        }
    }
}
