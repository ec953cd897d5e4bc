/// If `it` yields a single value, return that value. Otherwise, return `None`.
pub fn first_if_only<I: Iterator>(mut it: I) -> Option<<I as Iterator>::Item> {
    let first = match it.next() {
        Some(x) => x,
        None => return None,
    };
    match it.next() {
        Some(_) => None,
        None => Some(first),
    }
}

#[test]
fn test_first_if_only() {
    assert_eq!(first_if_only(Vec::<u8>::new().into_iter()), None);
    assert_eq!(first_if_only(vec![7].into_iter()), Some(7));
    assert_eq!(first_if_only(vec![7, 8].into_iter()), None);
}
