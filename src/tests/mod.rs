mod test_sync_bucket;
