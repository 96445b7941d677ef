mod compile_errors;
mod hello_world;
mod java_entry_point;
mod lifecycle;
