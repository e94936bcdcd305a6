#![no_main]
use libfuzzer_sys::fuzz_target;
use ntspor_tasks::Tasks;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(nts) = ntspor_nts::Nts::from_json(s) {
            if let Ok(tasks) = Tasks::compute_tasks(&nts, "main") {
                for (_, task) in tasks.iter() {
                    assert_eq!(
                        task.direct_global.union(&task.transitive_global),
                        task.transitive_global
                    );
                }
                let _ = tasks.global_variable_info(&nts);
            }
        }
    }
});
