mod errors;
mod extensions;
