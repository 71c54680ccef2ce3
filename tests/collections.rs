use pooled_collections::{
    BufferPool, Error, PoolOptions, PooledBitVector, PooledList, PooledPriorityQueue, PooledQueue,
    PooledStack,
};
use std::sync::Arc;

fn diagnostic_pool<T: pooled_collections::PoolElement>() -> Arc<BufferPool<T>> {
    Arc::new(BufferPool::with_options(PoolOptions::diagnostic()))
}

#[test]
fn list_storage_goes_back_to_its_pool() {
    let pool = diagnostic_pool::<Option<String>>();
    {
        let mut list = PooledList::new_in(pool.clone());
        for i in 0..100 {
            list.push(format!("item{}", i)).unwrap();
        }
        list.trim_excess().unwrap();
    }
    let report = pool.audit().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.outstanding, 0);
    let stats = pool.stats().unwrap();
    assert_eq!(stats.rents, stats.returns);
}

#[test]
fn list_capacity_no_op_invalidates_cursor() {
    let mut list: PooledList<u32> = PooledList::new();
    list.push(1).unwrap();
    list.push(2).unwrap();
    let mut c = list.cursor().unwrap();
    assert!(c.move_next(&list).unwrap());
    assert_eq!(*c.current(&list).unwrap(), 1);
    list.ensure_capacity(1).unwrap();
    assert_eq!(c.move_next(&list), Err(Error::VersionMismatch));
}

#[test]
fn list_fails_after_dispose() {
    let mut list: PooledList<u32> = PooledList::new();
    list.push(1).unwrap();
    list.dispose();
    list.dispose();
    assert_eq!(list.len(), Err(Error::Disposed));
    assert_eq!(list.push(2), Err(Error::Disposed));
    assert_eq!(list.pop(), Err(Error::Disposed));
    assert_eq!(list.get(0).map(drop), Err(Error::Disposed));
    assert_eq!(list.insert(5, 2), Err(Error::Disposed));
    assert_eq!(list.cursor().map(drop), Err(Error::Disposed));
}

#[test]
fn stack_and_queue_report_empty() {
    let mut stack: PooledStack<u8> = PooledStack::new();
    let mut queue: PooledQueue<u8> = PooledQueue::new();
    assert_eq!(stack.pop(), Err(Error::Empty));
    assert_eq!(queue.dequeue(), Err(Error::Empty));
    assert_eq!(queue.peek().map(drop), Err(Error::Empty));
    stack.push(1).unwrap();
    queue.enqueue(1).unwrap();
    stack.dispose();
    queue.dispose();
    assert_eq!(stack.pop(), Err(Error::Disposed));
    assert_eq!(queue.dequeue(), Err(Error::Disposed));
}

#[test]
fn queue_cursor_is_invalidated_by_enqueue() {
    let mut queue = PooledQueue::new_in(diagnostic_pool::<Option<i32>>());
    for i in 0..5 {
        queue.enqueue(i).unwrap();
    }
    let mut c = queue.cursor().unwrap();
    let mut seen = Vec::new();
    while c.move_next(&queue).unwrap() {
        seen.push(*c.current(&queue).unwrap());
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    c.reset(&queue).unwrap();
    queue.enqueue(5).unwrap();
    assert_eq!(c.move_next(&queue), Err(Error::VersionMismatch));
}

#[test]
fn priority_queue_sorts_like_a_heap() {
    let mut pq: PooledPriorityQueue<u64> = PooledPriorityQueue::new();
    let input: Vec<u64> = (0..500u64).map(|i| (i * 2654435761) % 1009).collect();
    for &x in &input {
        pq.push(x).unwrap();
    }
    let mut want = input.clone();
    want.sort();
    let mut got = Vec::new();
    while let Some(x) = pq.try_pop().unwrap() {
        got.push(x);
    }
    assert_eq!(got, want);
    assert_eq!(pq.peek().map(drop), Err(Error::Empty));
}

#[test]
fn bit_vector_cursor_and_dispose() {
    let mut bits = PooledBitVector::new_in(100, diagnostic_pool::<u64>()).unwrap();
    bits.set(3, true).unwrap();
    bits.set(99, true).unwrap();
    let mut c = bits.cursor().unwrap();
    let mut ones = Vec::new();
    let mut i = 0;
    while c.move_next(&bits).unwrap() {
        if c.current(&bits).unwrap() {
            ones.push(i);
        }
        i += 1;
    }
    assert_eq!(i, 100);
    assert_eq!(ones, vec![3, 99]);
    bits.toggle(3).unwrap();
    assert_eq!(c.reset(&bits), Err(Error::VersionMismatch));
    bits.dispose();
    assert_eq!(bits.get(0), Err(Error::Disposed));
    assert_eq!(bits.count_ones(), Err(Error::Disposed));
}
