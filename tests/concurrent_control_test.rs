// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证同一铸机上的并发写操作被串行化, 时间轴不变式保持成立
// ==========================================


#[cfg(test)]
mod concurrent_control_test {
    use std::sync::Arc;
    use std::thread;

    use caster_aps::api::CreateSlotRequest;
    use caster_aps::domain::types::{SlotKind, SlotStatus};
    use caster_aps::domain::SlotAttributes;
    use chrono::Duration;

    use crate::test_helpers::*;

    const THREADS: usize = 8;
    const PER_THREAD: usize = 5;

    fn request(caster_id: &str, worker: usize) -> CreateSlotRequest {
        CreateSlotRequest {
            caster_id: caster_id.to_string(),
            kind: SlotKind::Production,
            requested_start: at(9, 0),
            requested_end: at(9, 30),
            status: None,
            linked_process_ref: None,
            attrs: SlotAttributes::default(),
            created_by: format!("worker-{}", worker),
        }
    }

    #[test]
    fn test_concurrent_inserts_on_one_caster() {
        let env = setup_env();
        let api = env.api.clone();

        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let api = Arc::clone(&api);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        api.create_slot(request(CASTER, worker)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let slots = env.slot_repo.list_by_caster(CASTER).unwrap();
        assert_eq!(slots.len(), THREADS * PER_THREAD);

        // 首尾相接, 时长不变
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.status, SlotStatus::Planned);
            assert_eq!(slot.planned_end - slot.planned_start, Duration::minutes(30));
            assert_eq!(slot.planned_start, at(9, 0) + Duration::minutes(30 * i as i64));
        }
        assert_no_overlap(&env);

        let logs = env.api.list_recent_actions(CASTER, 1000).unwrap();
        assert_eq!(logs.len(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_concurrent_inserts_and_reanchor() {
        let env = setup_env();
        env.clock.set(at(8, 50));
        seed(&env, make_slot("HEAD", at(9, 0), at(10, 0), SlotStatus::Planned));
        seed(&env, make_slot("TAIL", at(10, 0), at(11, 0), SlotStatus::Planned));

        let api = env.api.clone();
        let starter = {
            let api = Arc::clone(&api);
            thread::spawn(move || {
                api.reanchor_on_start("HEAD", at(9, 20), "mes").unwrap();
            })
        };

        let inserters: Vec<_> = (0..4)
            .map(|worker| {
                let api = Arc::clone(&api);
                thread::spawn(move || {
                    let mut req = request(CASTER, worker);
                    req.requested_start = at(12, 0);
                    req.requested_end = at(12, 45);
                    api.create_slot(req).unwrap();
                })
            })
            .collect();

        starter.join().unwrap();
        for handle in inserters {
            handle.join().unwrap();
        }

        let head = env.slot_repo.find_by_id("HEAD").unwrap().unwrap();
        assert_eq!(head.status, SlotStatus::Melting);
        assert_eq!((head.planned_start, head.planned_end), (at(9, 20), at(10, 20)));

        let tail = env.slot_repo.find_by_id("TAIL").unwrap().unwrap();
        assert!(tail.planned_start >= at(10, 20));
        assert_eq!(tail.planned_end - tail.planned_start, Duration::hours(1));

        assert_eq!(env.slot_repo.list_by_caster(CASTER).unwrap().len(), 6);
        assert_no_overlap(&env);
    }

    #[test]
    fn test_casters_are_independent() {
        let env = setup_env();
        let api = env.api.clone();

        let handles: Vec<_> = ["CASTER-A", "CASTER-B", "CASTER-C"]
            .into_iter()
            .enumerate()
            .map(|(worker, caster)| {
                let api = Arc::clone(&api);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        api.create_slot(request(caster, worker)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for caster in ["CASTER-A", "CASTER-B", "CASTER-C"] {
            let slots = env.slot_repo.list_by_caster(caster).unwrap();
            assert_eq!(slots.len(), PER_THREAD);
            for pair in slots.windows(2) {
                assert!(pair[0].planned_end <= pair[1].planned_start);
            }
        }
        assert_eq!(env.api.list_casters().unwrap().len(), 3);
    }
}
