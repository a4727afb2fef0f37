mod determinism;
mod end_to_end;
mod header;
mod lifecycle;
mod ordering;
mod persistence;
mod random_variables;
