mod end_to_end;
mod persistence;
mod storage_fault;
