mod common;

mod connect;
mod dirs;
mod file_io;
mod info;
mod locks;
mod oplocks;
mod symlinks;
