use std::sync::Arc;

use hashfile::catalog::{Column, DataType, Schema};
use hashfile::config::{BufferPoolConfig, TableProperties};
use hashfile::storage::tuple::Tuple;
use hashfile::storage::StorageManager;
use hashfile::utils::scalar::ScalarValue;

#[test]
fn analyze_updates_and_persists_table_stats() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(Schema::new(vec![
        Column::new("a", DataType::Int32, false),
        Column::new("b", DataType::Varchar(None), true),
    ]));

    {
        let storage = StorageManager::new(dir.path(), BufferPoolConfig::default()).unwrap();
        let table = storage
            .create_table("t_analyze", schema.clone(), &TableProperties::lin_hash(vec![0]))
            .unwrap();
        for (a, b) in [(1, Some("x")), (2, None), (3, Some("x"))] {
            let b: ScalarValue = b.map(str::to_string).into();
            table
                .add_tuple(&Tuple::new(schema.clone(), vec![a.into(), b]))
                .unwrap();
        }
        assert_eq!(table.stats().num_tuples, 0);

        table.analyze().unwrap();
        let stats = table.stats();
        assert_eq!(stats.num_tuples, 3);
        assert_eq!(stats.column_stats[0].distinct_count, 3);
        assert_eq!(stats.column_stats[0].min, Some(ScalarValue::from(1i32)));
        assert_eq!(stats.column_stats[0].max, Some(ScalarValue::from(3i32)));
        assert_eq!(stats.column_stats[1].null_count, 1);
        assert_eq!(stats.column_stats[1].distinct_count, 1);
        assert!(stats.num_data_pages >= 3);
        storage.flush().unwrap();
    }

    let storage = StorageManager::new(dir.path(), BufferPoolConfig::default()).unwrap();
    let table = storage.open_table("t_analyze").unwrap();
    assert_eq!(table.stats().num_tuples, 3);
    assert_eq!(table.stats().column_stats[1].null_count, 1);
}
