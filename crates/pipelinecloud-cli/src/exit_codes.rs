//! Process exit codes. Part of the public contract for schedulers and CI.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIG_ERROR: i32 = 1; // Precheck failed, missing config or unusable certificate
pub const EXIT_AUTH_ERROR: i32 = 2; // Identity provider rejected or was unreachable
pub const EXIT_CONNECT_ERROR: i32 = 3; // Driver refused the connection
pub const EXIT_ENCODE_ERROR: i32 = 4; // Token could not be packed for the driver
